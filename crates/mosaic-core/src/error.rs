//! Error types for mosaic-core

use thiserror::Error;

use crate::sync::RemoteError;

/// Result type alias using mosaic-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Caller error, reported before any write happens
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local storage failure that is not a SQLite error (poisoned lock, bad row)
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Item or collection not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote store failure surfaced to a caller that awaited the network
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error means the local store could not complete the
    /// operation. Such an operation had no effect.
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Sqlite(_) | Self::Io(_) | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_persistence_errors() {
        assert!(Error::Database("lock poisoned".into()).is_persistence());
        assert!(Error::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_persistence());
        assert!(!Error::InvalidInput("empty name".into()).is_persistence());
        assert!(!Error::NotFound("abc".into()).is_persistence());
    }
}
