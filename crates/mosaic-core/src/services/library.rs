//! Library service: the one entry point for reading and changing items and
//! collections.
//!
//! Every mutation writes the store row and its ledger entry in a single
//! transaction, then pokes the reconciler. Nothing here waits on the network.

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use super::share::ShareInput;
use crate::db::{
    CollectionRepository, Database, ItemFilter, ItemRepository, LocalStore, PreferenceRepository,
    SharedDatabase, SqliteCollectionRepository, SqliteItemRepository, SqlitePreferenceRepository,
    SyncLedger, DEVICE_GUEST_ID_KEY,
};
use crate::models::{
    validate_name, Collection, CollectionId, Entity, EntityType, Item, ItemId, ItemUpdate,
    LedgerEntry, NewItem, Operation, SyncStatus,
};
use crate::sync::ReconcileTrigger;
use crate::{Error, Result};

/// Ledger summary for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOverview {
    /// Entries waiting for replay
    pub pending: usize,
    /// Entries that need user attention
    pub parked: usize,
    /// Earliest scheduled attempt (Unix ms)
    pub next_attempt_at: Option<i64>,
}

/// Thread-safe service over the local store.
#[derive(Clone)]
pub struct LibraryService {
    db: SharedDatabase,
    owner_id: String,
    trigger: Option<ReconcileTrigger>,
}

impl LibraryService {
    /// Open the library at `path`, acting as this device's guest owner.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(SharedDatabase::new(Database::open(path)?))
    }

    /// Open an in-memory library (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::new(SharedDatabase::new(Database::open_in_memory()?))
    }

    /// Wrap an open database, generating the device guest id on first use.
    pub fn new(db: SharedDatabase) -> Result<Self> {
        let owner_id = db.write(|tx| {
            let prefs = SqlitePreferenceRepository::new(tx);
            if let Some(owner_id) = prefs.get(DEVICE_GUEST_ID_KEY)? {
                return Ok(owner_id);
            }
            let owner_id = uuid::Uuid::now_v7().to_string();
            prefs.set(DEVICE_GUEST_ID_KEY, &owner_id)?;
            tracing::info!("Created device guest owner {owner_id}");
            Ok(owner_id)
        })?;

        Ok(Self {
            db,
            owner_id,
            trigger: None,
        })
    }

    /// Act on behalf of a signed-in account instead of the guest owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Result<Self> {
        let owner_id = owner_id.into().trim().to_string();
        if owner_id.is_empty() {
            return Err(Error::InvalidInput("owner id cannot be empty".to_string()));
        }
        self.owner_id = owner_id;
        Ok(self)
    }

    /// Fire `trigger` after every committed write.
    #[must_use]
    pub fn with_trigger(mut self, trigger: ReconcileTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub const fn database(&self) -> &SharedDatabase {
        &self.db
    }

    fn notify(&self) {
        if let Some(trigger) = &self.trigger {
            trigger.fire();
        }
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Save a new item. `collection_id`, when set, must name a stored collection.
    pub fn create_item(&self, draft: NewItem) -> Result<Item> {
        let item = Item::create(&self.owner_id, draft)?;

        self.db.write(|tx| {
            if let Some(collection_id) = &item.collection_id {
                require_collection(tx, collection_id)?;
            }
            SqliteItemRepository::new(tx).put(&item)?;
            enqueue(tx, Operation::Create, Entity::Item(item.clone()))
        })?;

        tracing::debug!("Created item {}", item.id);
        self.notify();
        Ok(item)
    }

    /// Save a share-sheet payload into the active collection.
    ///
    /// Falls back to the owner's default collection, then the newest one,
    /// and creates the default "Inbox" when there are none.
    pub fn save_shared(&self, input: ShareInput, note: Option<String>) -> Result<Item> {
        let mut item = Item::create(&self.owner_id, input.into_draft(note))?;

        self.db.write(|tx| {
            let target = self.share_target(tx)?;
            item.collection_id = Some(target);
            SqliteItemRepository::new(tx).put(&item)?;
            enqueue(tx, Operation::Create, Entity::Item(item.clone()))
        })?;

        tracing::debug!("Saved shared item {}", item.id);
        self.notify();
        Ok(item)
    }

    fn share_target(&self, tx: &Connection) -> Result<CollectionId> {
        let collections = SqliteCollectionRepository::new(tx);

        if let Some(selected) = SqlitePreferenceRepository::new(tx).selected_collection()? {
            if let Some(collection) = collections.get(&selected)? {
                if collection.owner_id == self.owner_id {
                    return Ok(selected);
                }
            }
        }
        if let Some(default) = collections.default_for(&self.owner_id)? {
            return Ok(default.id);
        }
        if let Some(newest) = collections
            .list()?
            .into_iter()
            .find(|collection| collection.owner_id == self.owner_id)
        {
            return Ok(newest.id);
        }

        let inbox = Collection::default_for(&self.owner_id);
        collections.put(&inbox)?;
        enqueue(tx, Operation::Create, Entity::Collection(inbox.clone()))?;
        tracing::info!("Created default collection {}", inbox.id);
        Ok(inbox.id)
    }

    /// Items newest first.
    pub fn list_items(&self, filter: ItemFilter) -> Result<Vec<Item>> {
        self.db
            .read(|conn| SqliteItemRepository::new(conn).list(filter))
    }

    pub fn get_item(&self, id: &ItemId) -> Result<Item> {
        self.db
            .read(|conn| SqliteItemRepository::new(conn).get(id))?
            .ok_or_else(|| Error::NotFound(format!("item {id}")))
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve_item_id(&self, prefix: &str) -> Result<ItemId> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("item id cannot be empty".to_string()));
        }

        let matches = self
            .db
            .read(|conn| SqliteItemRepository::new(conn).ids_with_prefix(prefix, 2))?;
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(Error::NotFound(format!("item {prefix}"))),
            _ => Err(Error::InvalidInput(format!(
                "item id prefix '{prefix}' is ambiguous"
            ))),
        }
    }

    /// Change an item's note or collection.
    ///
    /// An update that changes nothing is not queued for sync.
    pub fn update_item(&self, id: &ItemId, update: ItemUpdate) -> Result<Item> {
        if update.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }

        let (item, changed) = self.db.write(|tx| {
            let items = SqliteItemRepository::new(tx);
            let mut item = items
                .get(id)?
                .ok_or_else(|| Error::NotFound(format!("item {id}")))?;
            if let Some(Some(collection_id)) = &update.collection_id {
                require_collection(tx, collection_id)?;
            }

            let changed = item.apply(update);
            if changed {
                items.put(&item)?;
                enqueue(tx, Operation::Update, Entity::Item(item.clone()))?;
            }
            Ok((item, changed))
        })?;

        if changed {
            self.notify();
        }
        Ok(item)
    }

    /// Remove an item and queue its remote delete.
    ///
    /// Unsent entries for the item are dropped so only the delete remains.
    pub fn delete_item(&self, id: &ItemId) -> Result<()> {
        self.db.write(|tx| {
            if !SqliteItemRepository::new(tx).delete(id)? {
                return Err(Error::NotFound(format!("item {id}")));
            }
            supersede_with_delete(tx, EntityType::Item, &id.to_string())
        })?;

        tracing::debug!("Deleted item {id}");
        self.notify();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    pub fn create_collection(&self, name: &str) -> Result<Collection> {
        let collection = Collection::create(&self.owner_id, name)?;

        self.db.write(|tx| {
            SqliteCollectionRepository::new(tx).put(&collection)?;
            enqueue(tx, Operation::Create, Entity::Collection(collection.clone()))
        })?;

        tracing::debug!("Created collection {}", collection.id);
        self.notify();
        Ok(collection)
    }

    /// Collections newest first.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        self.db
            .read(|conn| SqliteCollectionRepository::new(conn).list())
    }

    pub fn get_collection(&self, id: &CollectionId) -> Result<Collection> {
        self.db
            .read(|conn| SqliteCollectionRepository::new(conn).get(id))?
            .ok_or_else(|| Error::NotFound(format!("collection {id}")))
    }

    pub fn rename_collection(&self, id: &CollectionId, name: &str) -> Result<Collection> {
        let name = validate_name(name)?;

        let (collection, changed) = self.db.write(|tx| {
            let collections = SqliteCollectionRepository::new(tx);
            let mut collection = collections
                .get(id)?
                .ok_or_else(|| Error::NotFound(format!("collection {id}")))?;
            if collection.name == name {
                return Ok((collection, false));
            }

            collection.name = name;
            collection.sync_status = SyncStatus::Pending;
            collections.put(&collection)?;
            enqueue(tx, Operation::Update, Entity::Collection(collection.clone()))?;
            Ok((collection, true))
        })?;

        if changed {
            self.notify();
        }
        Ok(collection)
    }

    /// Remove a collection. Its items keep pointing at the removed id.
    pub fn delete_collection(&self, id: &CollectionId) -> Result<()> {
        self.db.write(|tx| {
            if !SqliteCollectionRepository::new(tx).delete(id)? {
                return Err(Error::NotFound(format!("collection {id}")));
            }

            let prefs = SqlitePreferenceRepository::new(tx);
            if prefs.selected_collection()?.as_ref() == Some(id) {
                prefs.set_selected_collection(None)?;
            }
            supersede_with_delete(tx, EntityType::Collection, &id.to_string())
        })?;

        tracing::debug!("Deleted collection {id}");
        self.notify();
        Ok(())
    }

    /// Persist the collection to restore on next launch; `None` clears it.
    pub fn select_active_collection(&self, id: Option<&CollectionId>) -> Result<()> {
        self.db.write(|tx| {
            if let Some(id) = id {
                require_collection(tx, id)?;
            }
            SqlitePreferenceRepository::new(tx).set_selected_collection(id)
        })
    }

    /// The selected collection, if it is still stored.
    pub fn active_collection(&self) -> Result<Option<Collection>> {
        self.db.read(|conn| {
            let Some(id) = SqlitePreferenceRepository::new(conn).selected_collection()? else {
                return Ok(None);
            };
            SqliteCollectionRepository::new(conn).get(&id)
        })
    }

    // -----------------------------------------------------------------------
    // Sync inspection
    // -----------------------------------------------------------------------

    pub fn sync_overview(&self) -> Result<SyncOverview> {
        self.db.read(|conn| {
            let ledger = SyncLedger::new(conn);
            let counts = ledger.counts()?;
            Ok(SyncOverview {
                pending: counts.pending,
                parked: counts.parked,
                next_attempt_at: ledger.next_due_at()?,
            })
        })
    }

    /// Entries that stopped retrying, oldest first.
    pub fn parked_entries(&self) -> Result<Vec<LedgerEntry>> {
        self.db.read(|conn| SyncLedger::new(conn).parked())
    }

    /// Requeue every parked entry with a fresh retry budget.
    pub fn retry_parked(&self) -> Result<usize> {
        let requeued = self.db.write(|tx| {
            let parked = SyncLedger::new(tx).unpark_all()?;
            let store = LocalStore::new(tx);
            for entry in &parked {
                store.set_sync_status(
                    entry.entity_type,
                    &entry.target_id,
                    SyncStatus::Pending,
                    None,
                )?;
            }
            Ok(parked.len())
        })?;

        if requeued > 0 {
            tracing::info!("Requeued {requeued} parked sync entries");
            self.notify();
        }
        Ok(requeued)
    }
}

fn enqueue(tx: &Connection, operation: Operation, entity: Entity) -> Result<()> {
    SyncLedger::new(tx).enqueue(operation, entity.entity_type(), &entity.id(), Some(&entity))?;
    Ok(())
}

fn supersede_with_delete(tx: &Connection, entity_type: EntityType, id: &str) -> Result<()> {
    let ledger = SyncLedger::new(tx);
    let dropped = ledger.discard_lane(entity_type, id)?;
    if dropped > 0 {
        tracing::debug!("Dropped {dropped} unsent entries for {entity_type} {id}");
    }
    ledger.enqueue(Operation::Delete, entity_type, id, None)?;
    Ok(())
}

fn require_collection(conn: &Connection, id: &CollectionId) -> Result<()> {
    if SqliteCollectionRepository::new(conn).get(id)?.is_some() {
        Ok(())
    } else {
        Err(Error::NotFound(format!("collection {id}")))
    }
}
