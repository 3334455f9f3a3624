use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] mosaic_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Nothing to save: give some text, a URL or --image")]
    EmptyContent,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("Collection not found for id/prefix/name: {0}")]
    CollectionNotFound(String),
    #[error("{0}")]
    AmbiguousCollection(String),
    #[error("Pass either --collection or --unfiled, not both")]
    ConflictingFilter,
    #[error(
        "Sync is not configured. Set MOSAIC_SUPABASE_URL, MOSAIC_SUPABASE_ANON_KEY and MOSAIC_ACCESS_TOKEN."
    )]
    SyncNotConfigured,
}
