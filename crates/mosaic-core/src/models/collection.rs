//! Collection (mosaic) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::SyncStatus;
use crate::error::{Error, Result};
use super::{non_blank, now_millis};

/// Name given to the collection created on the first save with no collections.
pub const DEFAULT_COLLECTION_NAME: &str = "Inbox";

/// A unique identifier for a collection, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(Uuid);

impl CollectionId {
    /// Create a new unique collection ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named group of items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub owner_id: String,
    pub name: String,
    /// At most one default per owner is expected but not enforced
    pub is_default: bool,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Collection {
    /// Build a new collection, rejecting blank names.
    pub fn create(owner_id: &str, name: &str) -> Result<Self> {
        let name = validate_name(name)?;
        Ok(Self {
            id: CollectionId::new(),
            owner_id: owner_id.to_string(),
            name,
            is_default: false,
            sync_status: SyncStatus::Pending,
            last_error: None,
            created_at: now_millis(),
        })
    }

    /// The auto-created "Inbox" collection.
    pub fn default_for(owner_id: &str) -> Self {
        Self {
            id: CollectionId::new(),
            owner_id: owner_id.to_string(),
            name: DEFAULT_COLLECTION_NAME.to_string(),
            is_default: true,
            sync_status: SyncStatus::Pending,
            last_error: None,
            created_at: now_millis(),
        }
    }
}

/// Trimmed collection name, or `InvalidInput` when it is blank.
pub fn validate_name(name: &str) -> Result<String> {
    non_blank(Some(name.to_string()))
        .ok_or_else(|| Error::InvalidInput("collection name cannot be empty".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trims_name() {
        let collection = Collection::create("guest", "  Reading  ").unwrap();
        assert_eq!(collection.name, "Reading");
        assert!(!collection.is_default);
        assert_eq!(collection.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            Collection::create("guest", " \t "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_default_collection() {
        let inbox = Collection::default_for("guest");
        assert_eq!(inbox.name, DEFAULT_COLLECTION_NAME);
        assert!(inbox.is_default);
    }
}
