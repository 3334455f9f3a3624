//! Item repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::row::{parse_column, parse_optional_column};
use crate::error::Result;
use crate::models::{CollectionId, Item, ItemId, SyncStatus};

const ITEM_COLUMNS: &str = "id, owner_id, collection_id, text, source_url, source_domain, \
     image_url, note, status, sync_status, last_error, created_at, updated_at";

/// Which items a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemFilter {
    #[default]
    All,
    /// Items with no collection
    Unfiled,
    Collection(CollectionId),
}

impl From<Option<CollectionId>> for ItemFilter {
    fn from(value: Option<CollectionId>) -> Self {
        value.map_or(Self::All, Self::Collection)
    }
}

/// Trait for item storage operations
pub trait ItemRepository {
    /// Insert or replace an item by id
    fn put(&self, item: &Item) -> Result<()>;

    /// Get an item by ID
    fn get(&self, id: &ItemId) -> Result<Option<Item>>;

    /// List items newest first
    fn list(&self, filter: ItemFilter) -> Result<Vec<Item>>;

    /// Remove an item; returns whether a row existed
    fn delete(&self, id: &ItemId) -> Result<bool>;

    /// Record the outcome of a sync attempt
    fn set_sync_status(
        &self,
        id: &ItemId,
        status: SyncStatus,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// Item ids starting with `prefix`, for short-id lookups
    fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ItemId>>;
}

/// `SQLite` implementation of `ItemRepository`
pub struct SqliteItemRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteItemRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an item from a database row
    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: parse_column(row, 0)?,
            owner_id: row.get(1)?,
            collection_id: parse_optional_column(row, 2)?,
            text: row.get(3)?,
            source_url: row.get(4)?,
            source_domain: row.get(5)?,
            image_url: row.get(6)?,
            note: row.get(7)?,
            status: parse_column(row, 8)?,
            sync_status: parse_column(row, 9)?,
            last_error: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn put(&self, item: &Item) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO items (
                id, owner_id, collection_id, text, source_url, source_domain,
                image_url, note, status, sync_status, last_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.as_str(),
                item.owner_id,
                item.collection_id.map(|id| id.as_str()),
                item.text,
                item.source_url,
                item.source_domain,
                item.image_url,
                item.note,
                item.status.as_str(),
                item.sync_status.as_str(),
                item.last_error,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
                params![id.as_str()],
                Self::parse_item,
            )
            .optional()?;
        Ok(item)
    }

    fn list(&self, filter: ItemFilter) -> Result<Vec<Item>> {
        let order = "ORDER BY created_at DESC, id DESC";
        let items = match filter {
            ItemFilter::All => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT {ITEM_COLUMNS} FROM items {order}"))?;
                let rows = stmt.query_map([], Self::parse_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            ItemFilter::Unfiled => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE collection_id IS NULL {order}"
                ))?;
                let rows = stmt.query_map([], Self::parse_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            ItemFilter::Collection(collection_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE collection_id = ? {order}"
                ))?;
                let rows = stmt.query_map(params![collection_id.as_str()], Self::parse_item)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(items)
    }

    fn delete(&self, id: &ItemId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM items WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn set_sync_status(
        &self,
        id: &ItemId,
        status: SyncStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE items SET sync_status = ?, last_error = ? WHERE id = ?",
            params![status.as_str(), last_error, id.as_str()],
        )?;
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
    fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ItemId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM items WHERE id LIKE ? || '%' ORDER BY id LIMIT ?")?;
        let ids = stmt
            .query_map(params![prefix, limit as i64], |row| parse_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NewItem;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn item(content: &str) -> Item {
        Item::create("guest", NewItem::from_content(content)).unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());

        let saved = item("https://example.com/a");
        repo.put(&saved).unwrap();

        let fetched = repo.get(&saved.id).unwrap().unwrap();
        assert_eq!(fetched, saved);
    }

    #[test]
    fn test_put_is_upsert() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());

        let mut saved = item("hello");
        repo.put(&saved).unwrap();
        saved.note = Some("again".into());
        repo.put(&saved).unwrap();

        let items = repo.list(ItemFilter::All).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].note.as_deref(), Some("again"));
    }

    #[test]
    fn test_list_newest_first_and_filtered() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());
        let collection = CollectionId::new();

        let mut first = item("first");
        first.created_at = 1_000;
        let mut second = item("second");
        second.created_at = 2_000;
        second.collection_id = Some(collection);
        repo.put(&first).unwrap();
        repo.put(&second).unwrap();

        let all = repo.list(ItemFilter::All).unwrap();
        assert_eq!(all.iter().map(|i| i.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let filed = repo.list(ItemFilter::Collection(collection)).unwrap();
        assert_eq!(filed.len(), 1);
        assert_eq!(filed[0].id, second.id);

        let unfiled = repo.list(ItemFilter::Unfiled).unwrap();
        assert_eq!(unfiled.len(), 1);
        assert_eq!(unfiled[0].id, first.id);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());

        let saved = item("bye");
        repo.put(&saved).unwrap();
        assert!(repo.delete(&saved.id).unwrap());
        assert!(!repo.delete(&saved.id).unwrap());
        assert!(repo.get(&saved.id).unwrap().is_none());
    }

    #[test]
    fn test_set_sync_status() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());

        let saved = item("hello");
        repo.put(&saved).unwrap();
        repo.set_sync_status(&saved.id, SyncStatus::Failed, Some("rejected"))
            .unwrap();

        let fetched = repo.get(&saved.id).unwrap().unwrap();
        assert_eq!(fetched.sync_status, SyncStatus::Failed);
        assert_eq!(fetched.last_error.as_deref(), Some("rejected"));
    }

    #[test]
    fn test_ids_with_prefix() {
        let db = setup();
        let repo = SqliteItemRepository::new(db.connection());

        let saved = item("hello");
        repo.put(&saved).unwrap();
        let prefix: String = saved.id.to_string().chars().take(8).collect();

        assert_eq!(repo.ids_with_prefix(&prefix, 3).unwrap(), vec![saved.id]);
        assert!(repo.ids_with_prefix("zzzz", 3).unwrap().is_empty());
    }
}
