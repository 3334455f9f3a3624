//! Ledger replay and the remote stores it talks to.

mod memory;
mod reconciler;
mod remote;
mod supabase;

pub use memory::{MemoryRemoteStore, RemoteCall};
pub use reconciler::{
    backoff_delay, DrainReport, PullReport, ReconcileTrigger, Reconciler, ReconcilerHandle,
};
pub use remote::{FailureKind, RemoteError, RemoteResult, RemoteStore};
pub use supabase::SupabaseRemoteStore;
