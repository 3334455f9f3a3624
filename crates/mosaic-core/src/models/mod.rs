//! Data models for Mosaic

mod collection;
mod item;
mod sync;

pub use collection::{validate_name, Collection, CollectionId, DEFAULT_COLLECTION_NAME};
pub use item::{extract_domain, is_http_url, Item, ItemId, ItemStatus, ItemUpdate, NewItem, FALLBACK_DOMAIN};
pub use sync::{EntityType, Entity, EntryState, Lane, LedgerEntry, Operation, SyncStatus};

/// Current Unix time in milliseconds; every stored timestamp uses this clock.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Trimmed text, or `None` when the value is missing or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
