//! Scalar preference slot (key/value, local only)

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::CollectionId;

/// Collection the user last viewed or saved into
pub const SELECTED_COLLECTION_KEY: &str = "selected_collection_id";
/// Owner id generated for an anonymous device
pub const DEVICE_GUEST_ID_KEY: &str = "device_guest_id";

/// Trait for preference storage operations
pub trait PreferenceRepository {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// The persisted selected collection. Unparsable values read as unset.
    fn selected_collection(&self) -> Result<Option<CollectionId>> {
        Ok(self
            .get(SELECTED_COLLECTION_KEY)?
            .and_then(|value| value.parse().ok()))
    }

    fn set_selected_collection(&self, id: Option<&CollectionId>) -> Result<()> {
        match id {
            Some(id) => self.set(SELECTED_COLLECTION_KEY, &id.as_str()),
            None => self.remove(SELECTED_COLLECTION_KEY),
        }
    }
}

/// `SQLite` implementation of `PreferenceRepository`
pub struct SqlitePreferenceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePreferenceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceRepository for SqlitePreferenceRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM preferences WHERE key = ?", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_selected_collection_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqlitePreferenceRepository::new(db.connection());

        assert_eq!(repo.selected_collection().unwrap(), None);

        let id = CollectionId::new();
        repo.set_selected_collection(Some(&id)).unwrap();
        assert_eq!(repo.selected_collection().unwrap(), Some(id));

        repo.set_selected_collection(None).unwrap();
        assert_eq!(repo.selected_collection().unwrap(), None);
    }

    #[test]
    fn test_garbage_selection_reads_as_unset() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqlitePreferenceRepository::new(db.connection());

        repo.set(SELECTED_COLLECTION_KEY, "not-a-uuid").unwrap();
        assert_eq!(repo.selected_collection().unwrap(), None);
    }
}
