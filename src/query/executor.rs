//! Query executor: resolves cache keys, deduplicates fetches and merges pages.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{
    CacheConfig, CacheKey, CacheStore, CachedData, EntrySnapshot, KeyPrefix, Subscription,
    Windows,
};
use crate::infra::error::TransportError;

use super::pagination::{Page, PageCollection};
use super::retry::RetryPolicy;

pub(crate) const METRIC_QUERY_FETCH: &str = "dayboard_query_fetch_total";
pub(crate) const METRIC_QUERY_FETCH_MS: &str = "dayboard_query_fetch_ms";
pub(crate) const METRIC_QUERY_DEDUP: &str = "dayboard_query_dedup_total";
pub(crate) const METRIC_QUERY_ERROR: &str = "dayboard_query_error_total";
pub(crate) const METRIC_INVALIDATION: &str = "dayboard_invalidation_total";

const FIRST_PAGE: u32 = 1;

type DocumentFn = dyn Fn() -> BoxFuture<'static, Result<Value, TransportError>> + Send + Sync;
type PageFn = dyn Fn(u32) -> BoxFuture<'static, Result<Page, TransportError>> + Send + Sync;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedData, TransportError>>>;

/// How to produce the data of one cache key.
#[derive(Clone)]
pub enum QueryFn {
    /// A single JSON document.
    Document(Arc<DocumentFn>),
    /// A paged list; the argument is the page cursor to request.
    Paged(Arc<PageFn>),
}

impl QueryFn {
    pub fn document<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        Self::Document(Arc::new(move || fetch().boxed()))
    }

    pub fn paged<F, Fut>(fetch: F) -> Self
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page, TransportError>> + Send + 'static,
    {
        Self::Paged(Arc::new(move |cursor| fetch(cursor).boxed()))
    }
}

/// Per-query freshness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub windows: Windows,
    pub enabled: bool,
}

impl QueryOptions {
    pub fn new(freshness: Duration, retention: Duration) -> Self {
        Self {
            windows: Windows::new(freshness, retention),
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl From<&CacheConfig> for QueryOptions {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.freshness(), config.retention())
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchPlan {
    /// Fetch (or re-walk) the whole entry.
    Refresh,
    /// Append the page at this cursor to a paged entry.
    NextPage(u32),
}

/// Resolves cache keys against the store and the remote API.
///
/// Holds at most one in-flight fetch per key; initial fetches, refetches and
/// next-page requests for the same key all share that slot.
#[derive(Clone)]
pub struct QueryExecutor {
    store: CacheStore,
    retry: RetryPolicy,
    queries: Arc<DashMap<CacheKey, QueryFn>>,
    in_flight: Arc<DashMap<CacheKey, SharedFetch>>,
}

impl QueryExecutor {
    pub fn new(store: CacheStore) -> Self {
        let retry = RetryPolicy::from(store.config());
        Self::with_retry(store, retry)
    }

    pub fn with_retry(store: CacheStore, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            queries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::from(self.store.config())
    }

    /// Return the current snapshot of `key`, starting a fetch when the entry
    /// is missing or stale and the query is enabled.
    pub fn resolve(&self, key: CacheKey, query: QueryFn, options: QueryOptions) -> EntrySnapshot {
        let (snapshot, _) = self.resolve_inner(key, query, options);
        snapshot
    }

    /// Resolve `key` and wait for the fetch it started or joined, if any.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch(
        &self,
        key: CacheKey,
        query: QueryFn,
        options: QueryOptions,
    ) -> Result<EntrySnapshot, TransportError> {
        let (snapshot, pending) = self.resolve_inner(key.clone(), query, options);
        match pending {
            Some(pending) => {
                pending.await?;
                Ok(self.snapshot(&key))
            }
            None => Ok(snapshot),
        }
    }

    /// Force a fetch of `key` with its registered query.
    pub async fn refetch(&self, key: &CacheKey) -> Result<EntrySnapshot, TransportError> {
        if let Some(pending) = self.start(key, FetchPlan::Refresh) {
            pending.await?;
        }
        Ok(self.snapshot(key))
    }

    /// Request the next page of a paged entry.
    ///
    /// Joins the outstanding fetch instead when one is running for `key`, and
    /// does nothing once the server reported the last page.
    pub async fn fetch_next_page(&self, key: &CacheKey) -> Result<EntrySnapshot, TransportError> {
        let pending = self.in_flight.get(key).map(|entry| entry.value().clone());
        if let Some(pending) = pending {
            counter!(METRIC_QUERY_DEDUP).increment(1);
            pending.await?;
            return Ok(self.snapshot(key));
        }

        let next = self
            .store
            .data(key)
            .and_then(|data| data.as_pages().and_then(PageCollection::next_cursor));
        let Some(cursor) = next else {
            debug!(key = %key, "No further pages to request");
            return Ok(self.snapshot(key));
        };

        if let Some(pending) = self.start(key, FetchPlan::NextPage(cursor)) {
            pending.await?;
        }
        Ok(self.snapshot(key))
    }

    /// Mark entries under `prefix` stale and refetch the subscribed ones.
    ///
    /// Returns how many refetches were started or joined.
    pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        counter!(METRIC_INVALIDATION).increment(1);
        self.store
            .invalidate(prefix)
            .iter()
            .filter(|key| self.start(key, FetchPlan::Refresh).is_some())
            .count()
    }

    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        self.store.subscribe(key)
    }

    /// Drop an entry and its registered query.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.queries.remove(key);
        self.store.remove(key)
    }

    /// Collect expired entries along with their registered queries.
    pub fn collect_garbage(&self) -> usize {
        let expired = self.store.collect_garbage(tokio::time::Instant::now());
        for key in &expired {
            self.queries.remove(key);
        }
        expired.len()
    }

    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot {
        self.store
            .get(key)
            .unwrap_or_else(|| EntrySnapshot::empty(key.clone()))
    }

    fn resolve_inner(
        &self,
        key: CacheKey,
        query: QueryFn,
        options: QueryOptions,
    ) -> (EntrySnapshot, Option<SharedFetch>) {
        self.queries.insert(key.clone(), query);
        let snapshot = self.store.ensure(key.clone(), options.windows);
        if !options.enabled || !snapshot.is_stale {
            return (snapshot, None);
        }
        let pending = self.start(&key, FetchPlan::Refresh);
        (self.snapshot(&key), pending)
    }

    fn start(&self, key: &CacheKey, plan: FetchPlan) -> Option<SharedFetch> {
        let Some(query) = self.queries.get(key).map(|entry| entry.value().clone()) else {
            warn!(key = %key, "Fetch requested for a key without a registered query");
            return None;
        };

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                counter!(METRIC_QUERY_DEDUP).increment(1);
                debug!(key = %key, "Joined in-flight fetch");
                Some(existing.get().clone())
            }
            Entry::Vacant(vacant) => {
                let epoch = self.store.begin_fetch(key);
                let task = self
                    .clone()
                    .run_fetch(key.clone(), query, plan, epoch)
                    .boxed()
                    .shared();
                vacant.insert(task.clone());
                // Drive the fetch even if every caller goes away; the result
                // still lands in the store.
                tokio::spawn(task.clone());
                Some(task)
            }
        }
    }

    async fn run_fetch(
        self,
        key: CacheKey,
        query: QueryFn,
        plan: FetchPlan,
        epoch: u64,
    ) -> Result<CachedData, TransportError> {
        let started_at = Instant::now();
        counter!(METRIC_QUERY_FETCH).increment(1);
        debug!(key = %key, plan = ?plan, "Fetch started");

        let store = &self.store;
        let retry = self.retry;
        let result = match (&query, plan) {
            (QueryFn::Document(fetch), _) => retry.run(|| fetch()).await.map(CachedData::document),
            (QueryFn::Paged(fetch), FetchPlan::Refresh) => {
                let loaded = store
                    .data(&key)
                    .and_then(|data| data.as_pages().map(PageCollection::len))
                    .unwrap_or(1);
                refresh_pages(fetch, loaded, retry).await.map(CachedData::pages)
            }
            (QueryFn::Paged(fetch), FetchPlan::NextPage(cursor)) => {
                match retry.run(|| fetch(cursor)).await {
                    Ok(page) => {
                        let mut pages = store
                            .data(&key)
                            .and_then(|data| data.as_pages().cloned())
                            .unwrap_or_default();
                        pages.append(page);
                        Ok(CachedData::pages(pages))
                    }
                    Err(err) => Err(err),
                }
            }
        };

        histogram!(METRIC_QUERY_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        let superseded = match &result {
            Ok(data) => {
                debug!(key = %key, "Fetch completed");
                store.complete_fetch(&key, data.clone(), epoch)
            }
            Err(err) => {
                counter!(METRIC_QUERY_ERROR).increment(1);
                warn!(key = %key, error = %err, "Fetch failed; keeping last known data");
                store.fail_fetch(&key, err.clone());
                false
            }
        };
        self.in_flight.remove(&key);

        // The response predates an invalidation; observers still need the
        // post-invalidation data.
        if superseded && store.subscriber_count(&key) > 0 {
            debug!(key = %key, "Refetching entry invalidated mid-flight");
            self.start(&key, FetchPlan::Refresh);
        }
        result
    }
}

/// Re-walk the first `loaded` pages of a list, stopping at the server's last page.
async fn refresh_pages(
    fetch: &Arc<PageFn>,
    loaded: usize,
    retry: RetryPolicy,
) -> Result<PageCollection, TransportError> {
    let first = retry.run(|| fetch(FIRST_PAGE)).await?;
    let mut pages = PageCollection::new(first);
    while pages.len() < loaded {
        let Some(cursor) = pages.next_cursor() else {
            break;
        };
        let page = retry.run(|| fetch(cursor)).await?;
        pages.append(page);
    }
    Ok(pages)
}
