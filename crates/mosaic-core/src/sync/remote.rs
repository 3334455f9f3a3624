//! Remote store contract shared by the Supabase client and the in-memory
//! double.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Collection, Entity, EntityType, Item};

/// Whether a failed request is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, connectivity, throttling and server errors
    Transient,
    /// The request itself is wrong; repeating it cannot succeed
    Permanent,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("remote store is not configured")]
    NotConfigured,
}

impl RemoteError {
    /// Classify an HTTP error status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            408 => Self::Timeout,
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout | Self::Network(_) | Self::Server { .. } | Self::RateLimited(_) => {
                FailureKind::Transient
            }
            Self::Unauthorized(_)
            | Self::NotFound(_)
            | Self::Rejected { .. }
            | Self::InvalidPayload(_)
            | Self::NotConfigured => FailureKind::Permanent,
        }
    }

    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), FailureKind::Transient)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authoritative store the ledger is replayed against.
///
/// Every write must be idempotent: replaying an upsert or delete that
/// already took effect leaves the remote state unchanged.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create or replace the remote copy of `entity`, keyed by id.
    async fn upsert(&self, entity: &Entity) -> RemoteResult<()>;

    /// Remove an entity. Deleting something already gone succeeds.
    async fn delete(&self, entity_type: EntityType, id: &str) -> RemoteResult<()>;

    /// Items belonging to `owner_id`, newest first.
    async fn list_items(&self, owner_id: &str) -> RemoteResult<Vec<Item>>;

    /// Collections belonging to `owner_id`, newest first.
    async fn list_collections(&self, owner_id: &str) -> RemoteResult<Vec<Collection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(RemoteError::from_status(503, "busy").kind(), FailureKind::Transient);
        assert_eq!(RemoteError::from_status(429, "slow down").kind(), FailureKind::Transient);
        assert_eq!(RemoteError::from_status(408, "").kind(), FailureKind::Transient);
        assert_eq!(RemoteError::from_status(400, "bad").kind(), FailureKind::Permanent);
        assert_eq!(RemoteError::from_status(409, "conflict").kind(), FailureKind::Permanent);
        assert!(matches!(
            RemoteError::from_status(401, "expired"),
            RemoteError::Unauthorized(_)
        ));
    }

    #[test]
    fn network_and_timeout_are_transient() {
        assert!(RemoteError::Timeout.is_transient());
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(!RemoteError::NotConfigured.is_transient());
        assert!(!RemoteError::InvalidPayload("missing id".into()).is_transient());
    }
}
