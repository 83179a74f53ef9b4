#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dayboard::application::SyncClient;
use dayboard::cache::{CacheConfig, EntrySnapshot};
use dayboard::infra::error::TransportError;
use dayboard::infra::transport::{ApiRequest, Transport};
use dayboard::util::clock::FixedClock;
use dayboard_api_types::Envelope;
use serde_json::{Value, json};
use time::Date;

/// In-memory API answering `METHOD /path[?page=N]` routes from queued payloads.
///
/// The last payload queued for a route keeps being served.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, route: &str, data: Value) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(data);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls().iter().filter(|call| *call == route).count()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn request(&self, request: ApiRequest) -> Result<Envelope, TransportError> {
        let page = request
            .query
            .iter()
            .find(|(name, _)| name == "page")
            .map(|(_, value)| format!("?page={value}"))
            .unwrap_or_default();
        let route = format!("{} {}{page}", request.method, request.path);
        self.calls.lock().unwrap().push(route.clone());

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&route)
            .ok_or_else(|| TransportError::server(404, format!("no route for {route}")))?;
        let data = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        data.map(Envelope::ok)
            .ok_or_else(|| TransportError::server(404, format!("no payload for {route}")))
    }
}

pub fn client(api: &Arc<FakeApi>, today: Date) -> SyncClient {
    SyncClient::new(
        Arc::clone(api) as Arc<dyn Transport>,
        CacheConfig::default(),
        Arc::new(FixedClock(today)),
    )
}

pub fn habit(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn reminder(id: i64, title: &str) -> Value {
    json!({ "id": id, "title": title, "status": "active" })
}

pub fn page(field: &str, items: Vec<Value>, current: u32, total: u32) -> Value {
    json!({
        field: items,
        "pagination": { "current_page": current, "total_pages": total },
    })
}

pub fn ids(items: &[Value]) -> Vec<i64> {
    items
        .iter()
        .filter_map(|item| item.get("id").and_then(Value::as_i64))
        .collect()
}

/// Ids of every record in a paged entry, in page order.
pub fn paged_ids(snapshot: &EntrySnapshot) -> Vec<i64> {
    snapshot
        .data
        .as_ref()
        .and_then(|data| data.as_pages())
        .map(|pages| {
            pages
                .items()
                .filter_map(|item| item.get("id").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default()
}
