//! Sync ledger model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Collection, Item};
use crate::error::{Error, Result};

/// Whether the remote copy of an entity matches the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local change not yet confirmed by the remote store
    #[default]
    Pending,
    Synced,
    /// Last attempt failed transiently, another one is scheduled
    PendingRetry,
    /// Gave up; needs user attention
    Failed,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::PendingRetry => "pending_retry",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "pending_retry" => Ok(Self::PendingRetry),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Database(format!("unknown sync status '{other}'"))),
        }
    }
}

/// Kind of entity a ledger entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Item,
    Collection,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Collection => "collection",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "item" => Ok(Self::Item),
            "collection" => Ok(Self::Collection),
            other => Err(Error::Database(format!("unknown entity type '{other}'"))),
        }
    }
}

/// Mutation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::Database(format!("unknown ledger operation '{other}'"))),
        }
    }
}

/// Whether a ledger entry is eligible for automatic replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    #[default]
    Pending,
    /// Removed from automatic retry; blocks the rest of its lane
    Parked,
}

impl EntryState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parked => "parked",
        }
    }
}

impl FromStr for EntryState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "parked" => Ok(Self::Parked),
            other => Err(Error::Database(format!("unknown ledger state '{other}'"))),
        }
    }
}

/// Snapshot of an entity carried by create/update entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Entity {
    Item(Item),
    Collection(Collection),
}

impl Entity {
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Item(_) => EntityType::Item,
            Self::Collection(_) => EntityType::Collection,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Self::Item(item) => item.id.to_string(),
            Self::Collection(collection) => collection.id.to_string(),
        }
    }
}

/// Ordering scope for replay: one lane per entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane {
    pub entity_type: EntityType,
    pub target_id: String,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.target_id)
    }
}

/// A mutation not yet confirmed by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic, assigned by the ledger
    pub sequence: i64,
    pub operation: Operation,
    pub entity_type: EntityType,
    pub target_id: String,
    /// Entity state at enqueue time; `None` for deletes
    pub payload: Option<Entity>,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
    /// Failed replay attempts so far
    pub attempts: u32,
    /// Earliest replay time (Unix ms)
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
    pub state: EntryState,
}

impl LedgerEntry {
    pub fn lane(&self) -> Lane {
        Lane {
            entity_type: self.entity_type,
            target_id: self.target_id.clone(),
        }
    }

    pub const fn is_due(&self, now_ms: i64) -> bool {
        self.next_attempt_at <= now_ms
    }
}
