//! Application-facing services shared by every front-end.

mod library;
mod share;

pub use library::{LibraryService, SyncOverview};
pub use share::ShareInput;
