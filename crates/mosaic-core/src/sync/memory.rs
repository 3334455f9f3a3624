//! In-process remote store with scripted failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{Collection, Entity, EntityType, Item};

/// A request the store received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Upsert { entity_type: EntityType, id: String },
    Delete { entity_type: EntityType, id: String },
    ListItems,
    ListCollections,
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<String, Item>,
    collections: HashMap<String, Collection>,
    queued_failures: VecDeque<RemoteError>,
    failure: Option<RemoteError>,
    latency: Option<Duration>,
    calls: Vec<RemoteCall>,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Remote store kept in memory.
///
/// Upserts replace by id and deletes of missing ids succeed, so it behaves
/// like the hosted backend under replay.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next request with `error`. Queued failures are consumed in
    /// order before any persistent failure applies.
    pub fn fail_next(&self, error: RemoteError) {
        self.state().queued_failures.push_back(error);
    }

    /// Fail every request with `error` until cleared with `None`.
    pub fn fail_always(&self, error: Option<RemoteError>) {
        self.state().failure = error;
    }

    /// Delay every request, e.g. to trip a client timeout.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Place an entity directly, as if another device had written it.
    pub fn insert(&self, entity: Entity) {
        let mut state = self.state();
        match entity {
            Entity::Item(item) => {
                state.items.insert(item.id.to_string(), item);
            }
            Entity::Collection(collection) => {
                state.collections.insert(collection.id.to_string(), collection);
            }
        }
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.state().items.get(id).cloned()
    }

    pub fn collection(&self, id: &str) -> Option<Collection> {
        self.state().collections.get(id).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state().items.len()
    }

    pub fn collection_count(&self) -> usize {
        self.state().collections.len()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Most requests ever in progress at once
    pub fn peak_in_flight(&self) -> usize {
        self.state().peak_in_flight
    }

    /// Record the call and decide whether it fails.
    async fn begin(&self, call: RemoteCall) -> RemoteResult<()> {
        let (latency, outcome) = {
            let mut state = self.state();
            state.calls.push(call);
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            let outcome = match state.queued_failures.pop_front() {
                Some(error) => Err(error),
                None => state.failure.clone().map_or(Ok(()), Err),
            };
            (state.latency, outcome)
        };

        let _in_flight = InFlight(self);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

/// Releases the in-flight slot even when the caller gives up mid-request.
struct InFlight<'a>(&'a MemoryRemoteStore);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, entity: &Entity) -> RemoteResult<()> {
        self.begin(RemoteCall::Upsert {
            entity_type: entity.entity_type(),
            id: entity.id(),
        })
        .await?;
        self.insert(entity.clone());
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> RemoteResult<()> {
        self.begin(RemoteCall::Delete {
            entity_type,
            id: id.to_string(),
        })
        .await?;

        let mut state = self.state();
        match entity_type {
            EntityType::Item => {
                state.items.remove(id);
            }
            EntityType::Collection => {
                state.collections.remove(id);
            }
        }
        Ok(())
    }

    async fn list_items(&self, owner_id: &str) -> RemoteResult<Vec<Item>> {
        self.begin(RemoteCall::ListItems).await?;

        let mut items = self
            .state()
            .items
            .values()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn list_collections(&self, owner_id: &str) -> RemoteResult<Vec<Collection>> {
        self.begin(RemoteCall::ListCollections).await?;

        let mut collections = self
            .state()
            .collections
            .values()
            .filter(|collection| collection.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(collections)
    }
}
