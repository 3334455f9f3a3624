//! Entity-generic access to the local store, used by sync code that only
//! knows an entity type and an id.

use rusqlite::Connection;

use super::{
    CollectionRepository, ItemRepository, SqliteCollectionRepository, SqliteItemRepository,
};
use crate::error::{Error, Result};
use crate::models::{CollectionId, Entity, EntityType, ItemId, SyncStatus};

pub struct LocalStore<'a> {
    items: SqliteItemRepository<'a>,
    collections: SqliteCollectionRepository<'a>,
}

impl<'a> LocalStore<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            items: SqliteItemRepository::new(conn),
            collections: SqliteCollectionRepository::new(conn),
        }
    }

    /// Insert or replace the row for `entity`.
    pub fn put(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Item(item) => self.items.put(item),
            Entity::Collection(collection) => self.collections.put(collection),
        }
    }

    pub fn contains(&self, entity_type: EntityType, id: &str) -> Result<bool> {
        Ok(match entity_type {
            EntityType::Item => self.items.get(&parse_item_id(id)?)?.is_some(),
            EntityType::Collection => self
                .collections
                .get(&parse_collection_id(id)?)?
                .is_some(),
        })
    }

    /// Update sync bookkeeping. A row deleted meanwhile is skipped silently.
    pub fn set_sync_status(
        &self,
        entity_type: EntityType,
        id: &str,
        status: SyncStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        match entity_type {
            EntityType::Item => self
                .items
                .set_sync_status(&parse_item_id(id)?, status, last_error),
            EntityType::Collection => {
                self.collections
                    .set_sync_status(&parse_collection_id(id)?, status, last_error)
            }
        }
    }
}

fn parse_item_id(id: &str) -> Result<ItemId> {
    id.parse()
        .map_err(|_| Error::Database(format!("invalid item id '{id}' in ledger")))
}

fn parse_collection_id(id: &str) -> Result<CollectionId> {
    id.parse()
        .map_err(|_| Error::Database(format!("invalid collection id '{id}' in ledger")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Collection, Item, NewItem};

    #[test]
    fn test_dispatch_by_entity_type() {
        let db = Database::open_in_memory().unwrap();
        let store = LocalStore::new(db.connection());

        let item = Item::create("guest", NewItem::from_content("hello")).unwrap();
        let collection = Collection::create("guest", "Reading").unwrap();
        store.put(&Entity::Item(item.clone())).unwrap();
        store.put(&Entity::Collection(collection.clone())).unwrap();

        assert!(store.contains(EntityType::Item, &item.id.to_string()).unwrap());
        assert!(store
            .contains(EntityType::Collection, &collection.id.to_string())
            .unwrap());
        assert!(!store
            .contains(EntityType::Item, &collection.id.to_string())
            .unwrap());

        store
            .set_sync_status(EntityType::Item, &item.id.to_string(), SyncStatus::Synced, None)
            .unwrap();
        let stored = SqliteItemRepository::new(db.connection())
            .get(&item.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
    }

    #[test]
    fn test_rejects_malformed_id() {
        let db = Database::open_in_memory().unwrap();
        let store = LocalStore::new(db.connection());
        assert!(store.contains(EntityType::Item, "nope").is_err());
    }
}
