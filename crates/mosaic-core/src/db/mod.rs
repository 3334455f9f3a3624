//! Local store for Mosaic: items, collections, preferences and the sync
//! ledger, all in one `SQLite` database.

mod collection_repository;
mod connection;
mod item_repository;
mod ledger;
mod migrations;
mod preferences;
mod row;
mod store;

pub use collection_repository::{CollectionRepository, SqliteCollectionRepository};
pub use connection::{Database, SharedDatabase};
pub use item_repository::{ItemFilter, ItemRepository, SqliteItemRepository};
pub use ledger::{LedgerCounts, SyncLedger};
pub use preferences::{
    PreferenceRepository, SqlitePreferenceRepository, DEVICE_GUEST_ID_KEY,
    SELECTED_COLLECTION_KEY,
};
pub use store::LocalStore;
