//! Collection repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::row::parse_column;
use crate::error::Result;
use crate::models::{Collection, CollectionId, SyncStatus};

const COLLECTION_COLUMNS: &str =
    "id, owner_id, name, is_default, sync_status, last_error, created_at";

/// Trait for collection storage operations
pub trait CollectionRepository {
    /// Insert or replace a collection by id
    fn put(&self, collection: &Collection) -> Result<()>;

    /// Get a collection by ID
    fn get(&self, id: &CollectionId) -> Result<Option<Collection>>;

    /// List collections newest first
    fn list(&self) -> Result<Vec<Collection>>;

    /// The owner's default collection, if one is flagged
    fn default_for(&self, owner_id: &str) -> Result<Option<Collection>>;

    /// Remove a collection; its items are left untouched
    fn delete(&self, id: &CollectionId) -> Result<bool>;

    /// Record the outcome of a sync attempt
    fn set_sync_status(
        &self,
        id: &CollectionId,
        status: SyncStatus,
        last_error: Option<&str>,
    ) -> Result<()>;
}

/// `SQLite` implementation of `CollectionRepository`
pub struct SqliteCollectionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCollectionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_collection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: parse_column(row, 0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            is_default: row.get::<_, i32>(3)? != 0,
            sync_status: parse_column(row, 4)?,
            last_error: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn put(&self, collection: &Collection) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO collections (
                id, owner_id, name, is_default, sync_status, last_error, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                collection.id.as_str(),
                collection.owner_id,
                collection.name,
                i32::from(collection.is_default),
                collection.sync_status.as_str(),
                collection.last_error,
                collection.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &CollectionId) -> Result<Option<Collection>> {
        let collection = self
            .conn
            .query_row(
                &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?"),
                params![id.as_str()],
                Self::parse_collection,
            )
            .optional()?;
        Ok(collection)
    }

    fn list(&self) -> Result<Vec<Collection>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY created_at DESC, id DESC"
        ))?;
        let collections = stmt
            .query_map([], Self::parse_collection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    fn default_for(&self, owner_id: &str) -> Result<Option<Collection>> {
        let collection = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLLECTION_COLUMNS} FROM collections
                     WHERE owner_id = ? AND is_default = 1
                     ORDER BY created_at ASC
                     LIMIT 1"
                ),
                params![owner_id],
                Self::parse_collection,
            )
            .optional()?;
        Ok(collection)
    }

    fn delete(&self, id: &CollectionId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM collections WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn set_sync_status(
        &self,
        id: &CollectionId,
        status: SyncStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE collections SET sync_status = ?, last_error = ? WHERE id = ?",
            params![status.as_str(), last_error, id.as_str()],
        )?;
        Ok(())
    }
}
