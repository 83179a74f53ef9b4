//! Resource surfaces: endpoint paths paired with cache keys and mutation kinds.
//!
//! Each domain module exposes `*_query` builders returning a [`QuerySpec`]
//! (the key to observe plus the function that fetches it) and mutation
//! builders returning a ready-to-perform [`Mutation`](crate::mutation::Mutation).

pub mod habits;
pub mod projects;
pub mod reminders;
pub mod tags;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{CacheKey, CachedData, EntrySnapshot};
use crate::infra::transport::{ApiRequest, Transport};
use crate::query::{Page, QueryFn};

/// A cache key together with the query that produces its data.
#[derive(Clone)]
pub struct QuerySpec {
    pub key: CacheKey,
    pub query: QueryFn,
}

impl QuerySpec {
    pub fn new(key: CacheKey, query: QueryFn) -> Self {
        Self { key, query }
    }
}

/// Shared handle to the transport used by query functions.
pub type SharedTransport = Arc<dyn Transport>;

/// Query fetching the `data` member of one request.
pub fn document_query(transport: &SharedTransport, request: ApiRequest) -> QueryFn {
    let transport = Arc::clone(transport);
    QueryFn::document(move || {
        let transport = Arc::clone(&transport);
        let request = request.clone();
        async move { transport.data(request).await }
    })
}

/// Query fetching one page of a list per cursor.
pub fn paged_query(
    transport: &SharedTransport,
    request: ApiRequest,
    items_field: &'static str,
) -> QueryFn {
    let transport = Arc::clone(transport);
    QueryFn::paged(move |cursor| {
        let transport = Arc::clone(&transport);
        let request = request.clone().with_param("page", cursor);
        async move {
            let data = transport.data(request).await?;
            Page::from_data(&data, items_field, cursor)
        }
    })
}

/// Decode the records of a list entry, paged or not.
///
/// Document entries may hold a bare array or an object carrying the array
/// under `items_field` or `items`.
pub fn records<T: DeserializeOwned>(
    snapshot: &EntrySnapshot,
    items_field: &str,
) -> Result<Vec<T>, serde_json::Error> {
    match &snapshot.data {
        Some(CachedData::Pages(_)) => snapshot.decode_items(),
        Some(CachedData::Document(value)) => {
            let items = match value.as_ref() {
                Value::Array(items) => items.as_slice(),
                Value::Object(map) => match map.get(items_field).or_else(|| map.get("items")) {
                    Some(Value::Array(items)) => items.as_slice(),
                    _ => &[],
                },
                _ => &[],
            };
            items.iter().map(T::deserialize).collect()
        }
        None => Ok(Vec::new()),
    }
}
