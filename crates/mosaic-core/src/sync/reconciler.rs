//! Replays the sync ledger against the remote store.
//!
//! Entries are grouped into lanes, one per entity. Lanes are independent and
//! replay concurrently up to `max_concurrency`; inside a lane entries go out
//! strictly in sequence order and a failure stops the lane for this drain.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::config::ReconcilerConfig;
use crate::db::{
    CollectionRepository, LocalStore, SharedDatabase, SqliteCollectionRepository, SyncLedger,
};
use crate::error::Result;
use crate::models::{now_millis, Entity, EntityType, Lane, LedgerEntry, Operation, SyncStatus};

/// Outcome counts of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Entries confirmed by the remote store and removed
    pub applied: usize,
    /// Entries that failed transiently and were rescheduled
    pub retried: usize,
    /// Entries parked after a permanent failure or exhausted retries
    pub failed: usize,
    /// Entries left untouched: not yet due, or behind a failure in their lane
    pub deferred: usize,
}

impl DrainReport {
    fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.retried += other.retried;
        self.failed += other.failed;
        self.deferred += other.deferred;
    }

    pub const fn is_idle(&self) -> bool {
        self.applied == 0 && self.retried == 0 && self.failed == 0 && self.deferred == 0
    }
}

/// Outcome counts of one pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub items: usize,
    pub collections: usize,
    /// Remote rows ignored because a local change is still queued
    pub skipped: usize,
}

/// Wakes the background worker after a local write.
#[derive(Clone, Default)]
pub struct ReconcileTrigger(Arc<Notify>);

impl ReconcileTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a drain. Fires coalesce while a drain is already queued.
    pub fn fire(&self) {
        self.0.notify_one();
    }

    async fn fired(&self) {
        self.0.notified().await;
    }
}

/// Delay before the next attempt after `attempts` failures:
/// `base * 2^(attempts - 1)`, capped at `max_backoff`.
pub fn backoff_delay(config: &ReconcilerConfig, attempts: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
    config
        .base_backoff
        .saturating_mul(factor)
        .min(config.max_backoff)
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub struct Reconciler {
    db: SharedDatabase,
    remote: Arc<dyn RemoteStore>,
    config: ReconcilerConfig,
    drain_guard: Mutex<()>,
    drains: AtomicUsize,
}

impl Reconciler {
    pub fn new(db: SharedDatabase, remote: Arc<dyn RemoteStore>, config: ReconcilerConfig) -> Self {
        Self {
            db,
            remote,
            config,
            drain_guard: Mutex::new(()),
            drains: AtomicUsize::new(0),
        }
    }

    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Number of drains that have run to completion.
    pub fn drains_completed(&self) -> usize {
        self.drains.load(Ordering::Relaxed)
    }

    /// Replay every due lane once.
    ///
    /// Only one drain runs at a time; a second caller waits for the first to
    /// finish. Remote failures are recorded on the ledger and reported in the
    /// counts; only local store failures are returned as errors.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _guard = self.drain_guard.lock().await;
        let now = now_millis();
        let batch_size = self.config.batch_size;
        let entries = self
            .db
            .read(|conn| SyncLedger::new(conn).peek_pending(Some(batch_size)))?;

        let mut report = DrainReport::default();
        if entries.is_empty() {
            self.drains.fetch_add(1, Ordering::Relaxed);
            return Ok(report);
        }

        let mut ready = Vec::new();
        for lane in group_lanes(entries) {
            if lane.first().is_some_and(|head| head.is_due(now)) {
                ready.push(lane);
            } else {
                report.deferred += lane.len();
            }
        }

        let outcomes = stream::iter(ready)
            .map(|lane| self.replay_lane(lane))
            .buffer_unordered(self.config.max_concurrency)
            .collect::<Vec<_>>()
            .await;
        for outcome in outcomes {
            report.merge(outcome?);
        }

        self.drains.fetch_add(1, Ordering::Relaxed);
        if report.applied + report.retried + report.failed == 0 {
            tracing::debug!(deferred = report.deferred, "Nothing due in sync ledger");
        } else {
            tracing::info!(
                applied = report.applied,
                retried = report.retried,
                failed = report.failed,
                deferred = report.deferred,
                "Drained sync ledger"
            );
        }
        Ok(report)
    }

    async fn replay_lane(&self, entries: Vec<LedgerEntry>) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let total = entries.len();

        for (index, entry) in entries.into_iter().enumerate() {
            // A delete may have compacted the lane since the batch was read
            let sequence = entry.sequence;
            if self
                .db
                .read(|conn| SyncLedger::new(conn).get(sequence))?
                .is_none()
            {
                continue;
            }

            tracing::debug!(
                sequence,
                operation = %entry.operation,
                lane = %entry.lane(),
                attempt = entry.attempts + 1,
                "Replaying ledger entry"
            );

            match self.send(&entry).await {
                Ok(()) => {
                    self.confirm(&entry)?;
                    report.applied += 1;
                }
                Err(error) => {
                    report.deferred += total - index - 1;
                    if self.record_failure(&entry, &error)? {
                        report.retried += 1;
                    } else {
                        report.failed += 1;
                    }
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn send(&self, entry: &LedgerEntry) -> RemoteResult<()> {
        let request = async {
            match (entry.operation, &entry.payload) {
                (Operation::Delete, _) => {
                    self.remote
                        .delete(entry.entity_type, &entry.target_id)
                        .await
                }
                (_, Some(payload)) => self.remote.upsert(payload).await,
                (operation, None) => Err(RemoteError::InvalidPayload(format!(
                    "{operation} entry {} has no payload",
                    entry.sequence
                ))),
            }
        };

        tokio::time::timeout(self.config.request_timeout, request)
            .await
            .unwrap_or(Err(RemoteError::Timeout))
    }

    /// Drop the confirmed entry; the entity is synced once its lane is empty.
    fn confirm(&self, entry: &LedgerEntry) -> Result<()> {
        self.db.write(|tx| {
            let ledger = SyncLedger::new(tx);
            ledger.remove(entry.sequence)?;
            if entry.operation != Operation::Delete
                && !ledger.has_later_in_lane(entry.entity_type, &entry.target_id, entry.sequence)?
            {
                LocalStore::new(tx).set_sync_status(
                    entry.entity_type,
                    &entry.target_id,
                    SyncStatus::Synced,
                    None,
                )?;
            }
            Ok(())
        })
    }

    /// Record a failed attempt. Returns whether the entry will be retried.
    fn record_failure(&self, entry: &LedgerEntry, error: &RemoteError) -> Result<bool> {
        let attempts = entry.attempts.saturating_add(1);
        let message = error.to_string();
        let retry = error.is_transient() && attempts < self.config.max_attempts;

        self.db.write(|tx| {
            let ledger = SyncLedger::new(tx);
            let store = LocalStore::new(tx);
            if retry {
                let delay = backoff_delay(&self.config, attempts);
                let next_attempt_at = now_millis().saturating_add(duration_millis(delay));
                ledger.record_failure(entry.sequence, attempts, next_attempt_at, &message)?;
                store.set_sync_status(
                    entry.entity_type,
                    &entry.target_id,
                    SyncStatus::PendingRetry,
                    Some(&message),
                )?;
            } else {
                ledger.park(entry.sequence, attempts, &message)?;
                store.set_sync_status(
                    entry.entity_type,
                    &entry.target_id,
                    SyncStatus::Failed,
                    Some(&message),
                )?;
            }
            Ok(())
        })?;

        if retry {
            tracing::warn!(
                sequence = entry.sequence,
                lane = %entry.lane(),
                attempts,
                "Sync attempt failed, will retry: {message}"
            );
        } else {
            tracing::warn!(
                sequence = entry.sequence,
                lane = %entry.lane(),
                attempts,
                "Sync entry parked: {message}"
            );
        }
        Ok(retry)
    }

    /// Fetch the owner's remote collections and items into the local store.
    ///
    /// Entities with queued local changes are left alone, and nothing is
    /// ever deleted locally.
    pub async fn pull(&self, owner_id: &str) -> Result<PullReport> {
        let _guard = self.drain_guard.lock().await;

        let collections = self
            .with_timeout(self.remote.list_collections(owner_id))
            .await?;
        let items = self.with_timeout(self.remote.list_items(owner_id)).await?;

        let report = self.db.write(|tx| {
            let ledger = SyncLedger::new(tx);
            let busy_items = ledger
                .targets(EntityType::Item)?
                .into_iter()
                .collect::<HashSet<_>>();
            let busy_collections = ledger
                .targets(EntityType::Collection)?
                .into_iter()
                .collect::<HashSet<_>>();
            let collection_repo = SqliteCollectionRepository::new(tx);
            let store = LocalStore::new(tx);
            let mut report = PullReport::default();

            for mut collection in collections {
                if busy_collections.contains(&collection.id.to_string()) {
                    report.skipped += 1;
                    continue;
                }
                // The backend has no default flag; keep the local one
                if let Some(local) = collection_repo.get(&collection.id)? {
                    collection.is_default = local.is_default;
                }
                collection.sync_status = SyncStatus::Synced;
                collection.last_error = None;
                collection_repo.put(&collection)?;
                report.collections += 1;
            }

            for mut item in items {
                if busy_items.contains(&item.id.to_string()) {
                    report.skipped += 1;
                    continue;
                }
                if !item.has_content() {
                    tracing::warn!("Skipping remote item {} without content", item.id);
                    report.skipped += 1;
                    continue;
                }
                item.sync_status = SyncStatus::Synced;
                item.last_error = None;
                store.put(&Entity::Item(item))?;
                report.items += 1;
            }

            Ok(report)
        })?;

        tracing::info!(
            items = report.items,
            collections = report.collections,
            skipped = report.skipped,
            "Pulled remote state"
        );
        Ok(report)
    }

    async fn with_timeout<T>(
        &self,
        request: impl std::future::Future<Output = RemoteResult<T>>,
    ) -> RemoteResult<T> {
        tokio::time::timeout(self.config.request_timeout, request)
            .await
            .unwrap_or(Err(RemoteError::Timeout))
    }

    /// Time until the earliest pending lane head becomes due.
    fn next_retry_in(&self) -> Option<Duration> {
        let next = self
            .db
            .read(|conn| SyncLedger::new(conn).next_due_at())
            .ok()
            .flatten()?;
        let wait = next.saturating_sub(now_millis()).max(0);
        Some(Duration::from_millis(u64::try_from(wait).unwrap_or_default()))
    }

    /// Run drains in the background until the handle is shut down.
    ///
    /// A drain starts when `trigger` fires, when a scheduled retry becomes
    /// due, or every `poll_interval`. A drain still in flight at shutdown is
    /// abandoned; its entries stay in the ledger.
    pub fn spawn(self: Arc<Self>, trigger: ReconcileTrigger) -> ReconcilerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let poll_interval = self.config.poll_interval;
            let mut wait = Duration::ZERO;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    () = trigger.fired() => {}
                    () = tokio::time::sleep(wait) => {}
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = self.drain() => {
                        if let Err(error) = result {
                            tracing::error!("Background sync drain failed: {error}");
                        }
                    }
                }

                wait = self
                    .next_retry_in()
                    .map_or(poll_interval, |retry_in| retry_in.min(poll_interval));
            }

            tracing::debug!("Reconciler stopped");
        });

        ReconcilerHandle { shutdown, task }
    }
}

/// Handle to a background reconciler task.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::warn!("Reconciler task ended abnormally: {error}");
        }
    }
}

/// Split a batch into lanes, keeping sequence order inside each lane and
/// ordering lanes by their oldest entry.
fn group_lanes(entries: Vec<LedgerEntry>) -> Vec<Vec<LedgerEntry>> {
    let mut index: HashMap<Lane, usize> = HashMap::new();
    let mut lanes: Vec<Vec<LedgerEntry>> = Vec::new();

    for entry in entries {
        match index.entry(entry.lane()) {
            Entry::Occupied(slot) => lanes[*slot.get()].push(entry),
            Entry::Vacant(slot) => {
                slot.insert(lanes.len());
                lanes.push(vec![entry]);
            }
        }
    }

    lanes
}
