//! In-memory cache store.
//!
//! The store is the single source of truth for fetched data. Every mutation
//! goes through one lock, so updates to the table are serialized; readers get
//! [`EntrySnapshot`]s that never change underneath them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::infra::error::TransportError;

use super::config::CacheConfig;
use super::entry::{CacheEntry, CachedData, EntrySnapshot, QueryStatus, Windows};
use super::keys::{CacheKey, KeyPrefix};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "dayboard_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "dayboard_cache_miss_total";
pub(crate) const METRIC_CACHE_ENTRIES: &str = "dayboard_cache_entries";
pub(crate) const METRIC_CACHE_GC_EVICT: &str = "dayboard_cache_gc_evict_total";

struct Slot {
    entry: CacheEntry,
    sender: watch::Sender<EntrySnapshot>,
    subscribers: usize,
    generation: u64,
    /// Bumped whenever the data is invalidated or overwritten; a fetch that
    /// began under an older epoch cannot mark the entry fresh.
    epoch: u64,
    idle_since: Instant,
}

impl Slot {
    fn publish(&self, now: Instant) {
        self.sender.send_replace(self.entry.snapshot(now));
    }

    fn touch(&mut self, now: Instant) {
        if self.subscribers == 0 {
            self.idle_since = now;
        }
    }
}

struct StoreInner {
    config: CacheConfig,
    slots: RwLock<HashMap<CacheKey, Slot>>,
    next_generation: AtomicU64,
}

/// Shared handle to the cache table.
///
/// Cloning is cheap; all clones address the same table. Build one per
/// application root and inject it where it is needed.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                slots: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Windows applied to entries created without explicit query options.
    pub fn default_windows(&self) -> Windows {
        Windows::new(self.inner.config.freshness(), self.inner.config.retention())
    }

    // ========================================================================
    // Public contract
    // ========================================================================

    pub fn get(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        let slots = rw_read(&self.inner.slots, SOURCE, "get");
        let snapshot = slots.get(key).map(|slot| slot.entry.snapshot(Instant::now()));
        if snapshot.as_ref().is_some_and(|s| s.data.is_some()) {
            counter!(METRIC_CACHE_HIT).increment(1);
        } else {
            counter!(METRIC_CACHE_MISS).increment(1);
        }
        snapshot
    }

    /// Overwrite the data of `key` as if it had just been fetched.
    pub fn set(&self, key: CacheKey, data: CachedData) {
        let now = Instant::now();
        let windows = self.default_windows();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "set");
        let slot = self.slot_mut(&mut slots, key, windows, now);
        slot.entry.data = Some(data);
        slot.entry.status = QueryStatus::Success;
        slot.entry.error = None;
        slot.entry.fetched_at = Some(now);
        slot.entry.invalidated = false;
        slot.epoch += 1;
        slot.touch(now);
        slot.publish(now);
        debug!(key = %slot.entry.key, "Cache entry written directly");
    }

    /// Mark every entry under `prefix` stale.
    ///
    /// Entries that are already stale keep their epoch, so repeated
    /// invalidation while a refetch is pending does not schedule another.
    /// Returns the matching keys that have at least one subscriber; those are
    /// the only ones worth refetching.
    pub fn invalidate(&self, prefix: &KeyPrefix) -> Vec<CacheKey> {
        let now = Instant::now();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "invalidate");
        let mut observed = Vec::new();
        for (key, slot) in slots.iter_mut().filter(|(key, _)| prefix.matches(key)) {
            if !slot.entry.invalidated {
                slot.entry.invalidated = true;
                slot.epoch += 1;
            }
            slot.publish(now);
            if slot.subscribers > 0 {
                observed.push(key.clone());
            }
        }
        observed.sort();
        debug!(prefix = %prefix, observed = observed.len(), "Cache prefix invalidated");
        observed
    }

    /// Drop the entry for `key`; live subscribers receive an empty snapshot.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut slots = rw_write(&self.inner.slots, SOURCE, "remove");
        let removed = slots.remove(key);
        gauge!(METRIC_CACHE_ENTRIES).set(slots.len() as f64);
        match removed {
            Some(slot) => {
                slot.sender.send_replace(EntrySnapshot::empty(key.clone()));
                debug!(key = %key, subscribers = slot.subscribers, "Cache entry removed");
                true
            }
            None => false,
        }
    }

    /// Observe `key`, creating an idle entry on first subscription.
    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        let now = Instant::now();
        let windows = self.default_windows();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "subscribe");
        let slot = self.slot_mut(&mut slots, key.clone(), windows, now);
        slot.subscribers += 1;
        Subscription {
            receiver: slot.sender.subscribe(),
            generation: slot.generation,
            key,
            store: Arc::clone(&self.inner),
        }
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        rw_read(&self.inner.slots, SOURCE, "subscriber_count")
            .get(key)
            .map_or(0, |slot| slot.subscribers)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.inner.slots, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = rw_read(&self.inner.slots, SOURCE, "keys")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Drop entries that have had no subscriber for their retention window.
    pub fn collect_garbage(&self, now: Instant) -> Vec<CacheKey> {
        let mut slots = rw_write(&self.inner.slots, SOURCE, "collect_garbage");
        let expired: Vec<CacheKey> = slots
            .iter()
            .filter(|(_, slot)| {
                slot.subscribers == 0
                    && slot.entry.status != QueryStatus::Loading
                    && now.saturating_duration_since(slot.idle_since)
                        >= slot.entry.windows.retention()
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            slots.remove(key);
        }
        gauge!(METRIC_CACHE_ENTRIES).set(slots.len() as f64);
        if !expired.is_empty() {
            counter!(METRIC_CACHE_GC_EVICT).increment(expired.len() as u64);
            debug!(evicted = expired.len(), "Cache entries collected");
        }
        expired
    }

    // ========================================================================
    // Fetch lifecycle (driven by the query executor)
    // ========================================================================

    /// Create the entry if needed and apply the windows of the latest query.
    pub(crate) fn ensure(&self, key: CacheKey, windows: Windows) -> EntrySnapshot {
        let now = Instant::now();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "ensure");
        let slot = self.slot_mut(&mut slots, key, windows, now);
        slot.entry.windows = windows;
        slot.entry.snapshot(now)
    }

    /// Mark `key` loading and return the epoch the fetch starts under.
    pub(crate) fn begin_fetch(&self, key: &CacheKey) -> u64 {
        let now = Instant::now();
        let windows = self.default_windows();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "begin_fetch");
        let slot = self.slot_mut(&mut slots, key.clone(), windows, now);
        slot.entry.status = QueryStatus::Loading;
        slot.publish(now);
        slot.epoch
    }

    /// Apply a fetched payload. Entries removed mid-flight stay removed.
    ///
    /// Returns `true` when the entry was invalidated or overwritten after the
    /// fetch began; the payload is stored but the entry stays stale.
    pub(crate) fn complete_fetch(&self, key: &CacheKey, data: CachedData, epoch: u64) -> bool {
        let now = Instant::now();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "complete_fetch");
        let Some(slot) = slots.get_mut(key) else {
            debug!(key = %key, "Fetch completed for removed entry; response dropped");
            return false;
        };
        let superseded = slot.epoch != epoch;
        slot.entry.data = Some(data);
        slot.entry.status = QueryStatus::Success;
        slot.entry.error = None;
        slot.entry.fetched_at = Some(now);
        slot.entry.invalidated = superseded;
        slot.touch(now);
        slot.publish(now);
        if superseded {
            debug!(key = %key, "Entry invalidated while fetching; kept stale");
        }
        superseded
    }

    /// Record a failed fetch; previously fetched data is kept.
    pub(crate) fn fail_fetch(&self, key: &CacheKey, error: TransportError) {
        let now = Instant::now();
        let mut slots = rw_write(&self.inner.slots, SOURCE, "fail_fetch");
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        slot.entry.status = QueryStatus::Error;
        slot.entry.error = Some(error);
        slot.publish(now);
    }

    pub(crate) fn data(&self, key: &CacheKey) -> Option<CachedData> {
        rw_read(&self.inner.slots, SOURCE, "data")
            .get(key)
            .and_then(|slot| slot.entry.data.clone())
    }

    fn slot_mut<'a>(
        &self,
        slots: &'a mut HashMap<CacheKey, Slot>,
        key: CacheKey,
        windows: Windows,
        now: Instant,
    ) -> &'a mut Slot {
        if !slots.contains_key(&key) {
            gauge!(METRIC_CACHE_ENTRIES).set((slots.len() + 1) as f64);
        }
        slots.entry(key).or_insert_with_key(|key| {
            let entry = CacheEntry::new(key.clone(), windows);
            let (sender, _) = watch::channel(entry.snapshot(now));
            Slot {
                entry,
                sender,
                subscribers: 0,
                generation: self.next_generation(),
                epoch: 0,
                idle_since: now,
            }
        })
    }

    fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::Relaxed)
    }
}

impl StoreInner {
    fn release(&self, key: &CacheKey, generation: u64) {
        let mut slots = rw_write(&self.slots, SOURCE, "release");
        if let Some(slot) = slots.get_mut(key).filter(|slot| slot.generation == generation) {
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slot.idle_since = Instant::now();
            }
        }
    }
}

/// Live observation of one cache key.
///
/// Holding a subscription keeps the entry eligible for invalidation refetches
/// and protects it from collection. Dropping it releases both.
pub struct Subscription {
    key: CacheKey,
    receiver: watch::Receiver<EntrySnapshot>,
    generation: u64,
    store: Arc<StoreInner>,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Snapshot as of the latest notification.
    pub fn current(&self) -> EntrySnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change; `None` once the entry has been removed.
    pub async fn changed(&mut self) -> Option<EntrySnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.release(&self.key, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::keys::{Domain, Scope};

    fn store() -> CacheStore {
        CacheStore::new(CacheConfig {
            freshness_ms: 1_000,
            retention_ms: 10_000,
            ..Default::default()
        })
    }

    #[test]
    fn set_then_get_returns_fresh_success() {
        let store = store();
        let key = CacheKey::detail(Domain::Habits, 7);

        assert!(store.get(&key).is_none());
        store.set(key.clone(), CachedData::document(json!({ "id": 7 })));

        let snapshot = store.get(&key).expect("entry");
        assert_eq!(snapshot.status, QueryStatus::Success);
        assert!(!snapshot.is_stale);
        assert_eq!(
            snapshot.data.as_ref().and_then(CachedData::as_document),
            Some(&json!({ "id": 7 }))
        );
    }

    #[test]
    fn invalidate_marks_stale_and_reports_only_subscribed_keys() {
        let store = store();
        let watched = CacheKey::list(Domain::Habits, &[("page", "1")]);
        let unwatched = CacheKey::list(Domain::Habits, &[("page", "2")]);
        let other = CacheKey::detail(Domain::Habits, 1);
        for key in [&watched, &unwatched, &other] {
            store.set(key.clone(), CachedData::document(json!([])));
        }
        let _sub = store.subscribe(watched.clone());

        let observed = store.invalidate(&KeyPrefix::scope(Domain::Habits, Scope::List));

        assert_eq!(observed, vec![watched.clone()]);
        assert!(store.get(&watched).expect("watched").is_stale);
        assert!(store.get(&unwatched).expect("unwatched").is_stale);
        assert!(!store.get(&other).expect("other").is_stale);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let store = store();
        let key = CacheKey::new(Domain::Reminders, Scope::Stats);
        store.set(key.clone(), CachedData::document(json!({})));
        let _sub = store.subscribe(key.clone());

        let prefix = KeyPrefix::scope(Domain::Reminders, Scope::Stats);
        assert_eq!(store.invalidate(&prefix), store.invalidate(&prefix));
        assert!(store.get(&key).expect("entry").is_stale);
    }

    #[tokio::test]
    async fn remove_notifies_subscribers_with_empty_snapshot() {
        let store = store();
        let key = CacheKey::detail(Domain::Reminders, 42);
        store.set(key.clone(), CachedData::document(json!({ "id": 42 })));
        let mut sub = store.subscribe(key.clone());

        assert!(store.remove(&key));
        assert!(store.get(&key).is_none());
        assert!(sub.current().data.is_none());
        let last = sub.changed().await.expect("final notification");
        assert!(last.data.is_none());
        assert!(sub.changed().await.is_none());
        assert!(!store.remove(&key));
    }

    #[tokio::test]
    async fn subscribers_see_direct_writes() {
        let store = store();
        let key = CacheKey::detail(Domain::Tags, 3);
        let mut sub = store.subscribe(key.clone());
        assert!(sub.current().data.is_none());

        store.set(key, CachedData::document(json!({ "id": 3 })));
        let snapshot = sub.changed().await.expect("change");
        assert_eq!(snapshot.status, QueryStatus::Success);
    }

    #[test]
    fn subscription_drop_releases_count() {
        let store = store();
        let key = CacheKey::detail(Domain::Projects, 1);
        let first = store.subscribe(key.clone());
        let second = store.subscribe(key.clone());
        assert_eq!(store.subscriber_count(&key), 2);

        drop(first);
        assert_eq!(store.subscriber_count(&key), 1);
        drop(second);
        assert_eq!(store.subscriber_count(&key), 0);
    }

    #[test]
    fn stale_subscription_does_not_release_recreated_entry() {
        let store = store();
        let key = CacheKey::detail(Domain::Projects, 1);
        let old = store.subscribe(key.clone());
        store.remove(&key);
        let _new = store.subscribe(key.clone());

        drop(old);
        assert_eq!(store.subscriber_count(&key), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_collection_respects_retention_and_subscribers() {
        let store = store();
        let idle = CacheKey::detail(Domain::Tags, 1);
        let watched = CacheKey::detail(Domain::Tags, 2);
        store.set(idle.clone(), CachedData::document(json!({})));
        store.set(watched.clone(), CachedData::document(json!({})));
        let _sub = store.subscribe(watched.clone());

        assert!(store.collect_garbage(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.collect_garbage(Instant::now()), vec![idle.clone()]);
        assert!(store.get(&idle).is_none());
        assert!(store.get(&watched).is_some());
    }

    #[test]
    fn failed_fetch_keeps_previous_data() {
        let store = store();
        let key = CacheKey::new(Domain::Habits, Scope::Stats);
        store.set(key.clone(), CachedData::document(json!({ "total": 3 })));

        store.begin_fetch(&key);
        assert!(store.get(&key).expect("entry").is_loading());
        store.fail_fetch(&key, TransportError::network("offline"));

        let snapshot = store.get(&key).expect("entry");
        assert!(snapshot.is_error());
        assert!(snapshot.data.is_some());
        assert_eq!(snapshot.error, Some(TransportError::network("offline")));
    }

    #[test]
    fn completion_for_removed_entry_is_dropped() {
        let store = store();
        let key = CacheKey::detail(Domain::Habits, 9);
        let epoch = store.begin_fetch(&key);
        store.remove(&key);

        assert!(!store.complete_fetch(&key, CachedData::document(json!({ "id": 9 })), epoch));
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn completion_after_invalidation_stays_stale() {
        let store = store();
        let key = CacheKey::new(Domain::Habits, Scope::Grouped);
        let epoch = store.begin_fetch(&key);
        store.invalidate(&KeyPrefix::scope(Domain::Habits, Scope::Grouped));

        let superseded =
            store.complete_fetch(&key, CachedData::document(json!({ "version": 1 })), epoch);

        assert!(superseded);
        let snapshot = store.get(&key).expect("entry");
        assert_eq!(snapshot.status, QueryStatus::Success);
        assert!(snapshot.is_stale);
        assert!(snapshot.data.is_some());
    }

    #[test]
    fn repeated_invalidation_keeps_one_epoch() {
        let store = store();
        let key = CacheKey::new(Domain::Reminders, Scope::Stats);
        store.set(key.clone(), CachedData::document(json!({})));
        let prefix = KeyPrefix::scope(Domain::Reminders, Scope::Stats);

        store.invalidate(&prefix);
        let epoch = store.begin_fetch(&key);
        store.invalidate(&prefix);
        store.invalidate(&prefix);

        assert!(!store.complete_fetch(&key, CachedData::document(json!({})), epoch));
        assert!(!store.get(&key).expect("entry").is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_restart_the_idle_clock() {
        let store = store();
        let key = CacheKey::new(Domain::Tags, Scope::List);
        store.set(key.clone(), CachedData::document(json!([])));

        tokio::time::advance(Duration::from_secs(6)).await;
        let epoch = store.begin_fetch(&key);
        store.complete_fetch(&key, CachedData::document(json!([])), epoch);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.collect_garbage(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.collect_garbage(Instant::now()), vec![key]);
    }
}
