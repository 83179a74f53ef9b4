//! Cache entries and the immutable snapshots handed to readers.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

use crate::infra::error::TransportError;
use crate::query::pagination::PageCollection;

use super::keys::CacheKey;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Payload of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Document(Arc<Value>),
    Pages(Arc<PageCollection>),
}

impl CachedData {
    pub fn document(value: Value) -> Self {
        Self::Document(Arc::new(value))
    }

    pub fn pages(pages: PageCollection) -> Self {
        Self::Pages(Arc::new(pages))
    }

    pub fn as_document(&self) -> Option<&Value> {
        match self {
            CachedData::Document(value) => Some(value),
            CachedData::Pages(_) => None,
        }
    }

    pub fn as_pages(&self) -> Option<&PageCollection> {
        match self {
            CachedData::Pages(pages) => Some(pages),
            CachedData::Document(_) => None,
        }
    }

    /// JSON rendering used by the command-line surface.
    pub fn to_json(&self) -> Value {
        match self {
            CachedData::Document(value) => Value::clone(value),
            CachedData::Pages(pages) => {
                serde_json::to_value(pages.as_ref()).unwrap_or(Value::Null)
            }
        }
    }
}

/// Freshness and retention windows of one entry.
///
/// The constructor clamps freshness to retention so an entry can never be
/// collected while it would still be served as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    freshness: Duration,
    retention: Duration,
}

impl Windows {
    pub fn new(freshness: Duration, retention: Duration) -> Self {
        Self {
            freshness: freshness.min(retention),
            retention,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

/// One cached query result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Option<CachedData>,
    pub status: QueryStatus,
    pub error: Option<TransportError>,
    pub fetched_at: Option<Instant>,
    pub windows: Windows,
    /// Set by invalidation, cleared by the next successful fetch or write.
    pub invalidated: bool,
}

impl CacheEntry {
    pub fn new(key: CacheKey, windows: Windows) -> Self {
        Self {
            key,
            data: None,
            status: QueryStatus::Idle,
            error: None,
            fetched_at: None,
            windows,
            invalidated: false,
        }
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fetched_at {
            Some(fetched_at) => now.saturating_duration_since(fetched_at) >= self.windows.freshness,
            None => true,
        }
    }

    pub fn snapshot(&self, now: Instant) -> EntrySnapshot {
        EntrySnapshot {
            key: self.key.clone(),
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            is_stale: self.is_stale(now),
        }
    }
}

/// Read-only view of a [`CacheEntry`] at one instant.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub data: Option<CachedData>,
    pub status: QueryStatus,
    pub error: Option<TransportError>,
    pub fetched_at: Option<Instant>,
    pub is_stale: bool,
}

impl EntrySnapshot {
    /// Snapshot of an entry that does not exist (yet, or any more).
    pub fn empty(key: CacheKey) -> Self {
        Self {
            key,
            data: None,
            status: QueryStatus::Idle,
            error: None,
            fetched_at: None,
            is_stale: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn has_next_page(&self) -> bool {
        self.data
            .as_ref()
            .and_then(CachedData::as_pages)
            .and_then(PageCollection::next_cursor)
            .is_some()
    }

    /// Decode a document entry into `T`; `None` until data arrives.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.data {
            Some(CachedData::Document(value)) => T::deserialize(value.as_ref()).map(Some),
            Some(CachedData::Pages(_)) | None => Ok(None),
        }
    }

    /// Decode every item of a paged entry, in fetch order.
    pub fn decode_items<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        match &self.data {
            Some(CachedData::Pages(pages)) => pages.items().map(T::deserialize).collect(),
            Some(CachedData::Document(_)) | None => Ok(Vec::new()),
        }
    }
}
