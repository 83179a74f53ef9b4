//! The sync client: one store, one query executor and one mutation executor
//! sharing a transport and a clock.

use std::sync::Arc;

use serde_json::Value;
use time::Date;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{QuerySpec, SharedTransport};
use crate::cache::{CacheConfig, CacheKey, CacheStore, EntrySnapshot, KeyPrefix, Subscription};
use crate::config::Settings;
use crate::filter::Debouncer;
use crate::infra::error::{InfraError, TransportError};
use crate::infra::transport::HttpTransport;
use crate::mutation::{Mutation, MutationExecutor};
use crate::query::{QueryExecutor, QueryOptions};
use crate::util::clock::{Clock, SystemClock};

const SOURCE: &str = "dayboard::application::client";

#[derive(Clone)]
pub struct SyncClient {
    transport: SharedTransport,
    queries: QueryExecutor,
    mutations: MutationExecutor,
    clock: Arc<dyn Clock>,
}

impl SyncClient {
    /// Build a client talking HTTP to the configured API.
    pub fn from_settings(settings: &Settings) -> Result<Self, InfraError> {
        let transport: SharedTransport = Arc::new(HttpTransport::new(&settings.api)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.cache.utc_offset));
        Ok(Self::new(
            transport,
            CacheConfig::from(&settings.cache),
            clock,
        ))
    }

    pub fn new(transport: SharedTransport, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let queries = QueryExecutor::new(CacheStore::new(config));
        let mutations =
            MutationExecutor::new(Arc::clone(&transport), queries.clone(), Arc::clone(&clock));
        Self {
            transport,
            queries,
            mutations,
            clock,
        }
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn store(&self) -> &CacheStore {
        self.queries.store()
    }

    pub fn queries(&self) -> &QueryExecutor {
        &self.queries
    }

    pub fn mutations(&self) -> &MutationExecutor {
        &self.mutations
    }

    pub fn today(&self) -> Date {
        self.clock.today()
    }

    /// Current snapshot of `spec`, starting a background fetch when needed.
    pub fn resolve(&self, spec: QuerySpec) -> EntrySnapshot {
        let options = self.queries.default_options();
        self.queries.resolve(spec.key, spec.query, options)
    }

    /// Resolve `spec` and wait for any fetch it starts or joins.
    pub async fn fetch(&self, spec: QuerySpec) -> Result<EntrySnapshot, TransportError> {
        let options = self.queries.default_options();
        self.fetch_with(spec, options).await
    }

    pub async fn fetch_with(
        &self,
        spec: QuerySpec,
        options: QueryOptions,
    ) -> Result<EntrySnapshot, TransportError> {
        self.queries.fetch(spec.key, spec.query, options).await
    }

    /// Fetch a paged list and keep requesting pages until `pages` are loaded
    /// or the server reports the last page.
    pub async fn fetch_pages(
        &self,
        spec: QuerySpec,
        pages: u32,
    ) -> Result<EntrySnapshot, TransportError> {
        let key = spec.key.clone();
        let mut snapshot = self.fetch(spec).await?;
        while loaded_pages(&snapshot) < pages {
            let before = loaded_pages(&snapshot);
            snapshot = self.queries.fetch_next_page(&key).await?;
            if loaded_pages(&snapshot) == before {
                debug!(source = SOURCE, key = %key, pages = before, "Reached the last page");
                break;
            }
        }
        Ok(snapshot)
    }

    pub async fn fetch_next_page(&self, key: &CacheKey) -> Result<EntrySnapshot, TransportError> {
        self.queries.fetch_next_page(key).await
    }

    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        self.queries.subscribe(key)
    }

    pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        self.queries.invalidate(prefix)
    }

    pub async fn perform(&self, mutation: Mutation) -> Result<Value, TransportError> {
        self.mutations.perform(mutation).await
    }

    /// Spawn the periodic retention sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let queries = self.queries.clone();
        let period = queries.store().config().gc_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let collected = queries.collect_garbage();
                if collected > 0 {
                    info!(source = SOURCE, collected, "Collected expired cache entries");
                }
            }
        })
    }

    /// Debouncer for free-text search using the configured quiet period.
    pub fn debouncer<T, F>(&self, sink: F) -> Debouncer<T>
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let quiet = self.store().config().debounce();
        Debouncer::spawn(quiet, sink)
    }
}

fn loaded_pages(snapshot: &EntrySnapshot) -> u32 {
    snapshot
        .data
        .as_ref()
        .and_then(|data| data.as_pages())
        .map_or(0, |pages| pages.len() as u32)
}
