//! mosaic-core - Core library for Mosaic
//!
//! Local-first storage for saved items and the collections that group them.
//! Writes land in a local `SQLite` store together with a sync ledger entry;
//! the reconciler replays the ledger against the remote store in the
//! background.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;

pub use config::{ReconcilerConfig, RemoteConfig};
pub use error::{Error, Result};
pub use models::{Collection, CollectionId, Item, ItemId, NewItem};
pub use services::{LibraryService, ShareInput};
