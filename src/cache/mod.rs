//! Dayboard Cache Store
//!
//! Keyed, in-memory cache of fetched query results:
//!
//! - **Keys**: `(domain, scope, params)` tuples with hierarchical prefixes
//! - **Entries**: data, status, last error and freshness per key
//! - **Subscriptions**: watch-channel observers that keep entries alive
//!
//! ## Configuration
//!
//! Freshness and retention windows are controlled via `dayboard.toml`:
//!
//! ```toml
//! [cache]
//! freshness_ms = 30000
//! retention_ms = 300000
//! gc_interval_ms = 60000
//! # ... see config.rs for all options
//! ```

mod config;
mod entry;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedData, EntrySnapshot, QueryStatus, Windows};
pub use keys::{CacheKey, Domain, KeyPrefix, Scope, hash_query, iso_date};
pub use store::{CacheStore, Subscription};

pub(crate) use store::{
    METRIC_CACHE_ENTRIES, METRIC_CACHE_GC_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
};
