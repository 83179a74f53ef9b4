//! Mutation executor: sends writes and applies their cache effects.

use std::sync::Arc;

use metrics::counter;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CachedData};
use crate::infra::error::TransportError;
use crate::infra::transport::{ApiRequest, Transport};
use crate::query::QueryExecutor;
use crate::util::clock::Clock;

use super::graph::{DirectWrite, MutationDescriptor, MutationKind, descriptor};

pub(crate) const METRIC_MUTATION: &str = "dayboard_mutation_total";
pub(crate) const METRIC_MUTATION_ERROR: &str = "dayboard_mutation_error_total";

/// A write request together with the cache effects it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub request: ApiRequest,
}

impl Mutation {
    pub fn new(kind: MutationKind, method: Method, path: impl Into<String>) -> Self {
        Self {
            kind,
            request: ApiRequest::new(method, path),
        }
    }

    pub fn with_body<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        self.request = self.request.with_body(body)?;
        Ok(self)
    }
}

/// Sends mutations and, on success, applies their descriptor to the cache.
///
/// Failed mutations leave the cache untouched and are never retried.
#[derive(Clone)]
pub struct MutationExecutor {
    transport: Arc<dyn Transport>,
    queries: QueryExecutor,
    clock: Arc<dyn Clock>,
}

impl MutationExecutor {
    pub fn new(transport: Arc<dyn Transport>, queries: QueryExecutor, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            queries,
            clock,
        }
    }

    /// Send `mutation` and return the response `data`.
    pub async fn perform(&self, mutation: Mutation) -> Result<Value, TransportError> {
        let mutation_id = Uuid::new_v4();
        let label = mutation.kind.label();
        counter!(METRIC_MUTATION, "kind" => label).increment(1);
        info!(
            mutation_id = %mutation_id,
            mutation_kind = label,
            method = %mutation.request.method,
            path = %mutation.request.path,
            "Mutation dispatched"
        );

        let data = match self.transport.data(mutation.request).await {
            Ok(data) => data,
            Err(err) => {
                counter!(METRIC_MUTATION_ERROR, "kind" => label).increment(1);
                warn!(
                    mutation_id = %mutation_id,
                    mutation_kind = label,
                    error = %err,
                    "Mutation failed; cache left untouched"
                );
                return Err(err);
            }
        };

        let descriptor = descriptor(mutation.kind, self.clock.today());
        let refetches = self.apply(&descriptor, &data);
        info!(
            mutation_id = %mutation_id,
            mutation_kind = label,
            refetches,
            "Mutation applied"
        );
        Ok(data)
    }

    /// Apply direct writes, then invalidations. Returns the refetch count.
    fn apply(&self, descriptor: &MutationDescriptor, data: &Value) -> usize {
        let mut refetches = 0;
        for write in &descriptor.direct_writes {
            match write {
                DirectWrite::Set(key) => refetches += self.write(key.clone(), data),
                DirectWrite::SetCreated(domain) => match data.get("id").and_then(Value::as_i64) {
                    Some(id) => refetches += self.write(CacheKey::detail(*domain, id), data),
                    None => debug!(domain = domain.as_str(), "Create response carried no id"),
                },
                DirectWrite::Remove(key) => {
                    self.queries.remove(key);
                }
            }
        }

        refetches
            + descriptor
                .invalidates
                .iter()
                .map(|prefix| self.queries.invalidate(prefix))
                .sum::<usize>()
    }

    /// Overwrite `key` with the response record, or invalidate it when the
    /// response carries no record. Returns the refetch count.
    fn write(&self, key: CacheKey, data: &Value) -> usize {
        if !data.is_object() {
            debug!(key = %key, "Mutation response is not a record; invalidating instead");
            return self.queries.invalidate(&key.as_prefix());
        }
        self.queries
            .store()
            .set(key, CachedData::document(data.clone()));
        0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use dayboard_api_types::Envelope;
    use serde_json::json;
    use time::macros::date;

    use super::*;
    use crate::cache::{CacheConfig, CacheStore, Domain, KeyPrefix, QueryStatus, Scope};
    use crate::query::{QueryFn, RetryPolicy};
    use crate::util::clock::FixedClock;

    #[derive(Default)]
    struct Scripted {
        responses: Mutex<VecDeque<Result<Envelope, TransportError>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn request(&self, request: ApiRequest) -> Result<Envelope, TransportError> {
            self.sent.lock().expect("sent").push(request);
            self.responses
                .lock()
                .expect("responses")
                .pop_front()
                .unwrap_or_else(|| Ok(Envelope::ok(Value::Null)))
        }
    }

    fn setup(responses: Vec<Result<Envelope, TransportError>>) -> (MutationExecutor, Arc<Scripted>) {
        let transport = Arc::new(Scripted {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        });
        let queries =
            QueryExecutor::with_retry(CacheStore::new(CacheConfig::default()), RetryPolicy::none());
        let executor = MutationExecutor::new(
            transport.clone(),
            queries,
            Arc::new(FixedClock(date!(2024 - 05 - 01))),
        );
        (executor, transport)
    }

    #[tokio::test]
    async fn create_reminder_writes_detail_from_response() {
        let (executor, transport) = setup(vec![Ok(Envelope::ok(json!({
            "id": 31,
            "title": "Stretch",
            "status": "active",
        })))]);

        let mutation = Mutation::new(MutationKind::ReminderCreated, Method::POST, "/reminder")
            .with_body(&json!({ "title": "Stretch" }))
            .expect("body");
        executor.perform(mutation).await.expect("created");

        let detail = executor
            .queries
            .store()
            .get(&CacheKey::detail(Domain::Reminders, 31))
            .expect("detail written");
        assert_eq!(detail.status, QueryStatus::Success);
        assert_eq!(transport.sent.lock().expect("sent").len(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let (executor, _) = setup(vec![Err(TransportError::server(422, "title required"))]);
        let store = executor.queries.store().clone();
        let list = CacheKey::list(Domain::Reminders, &[("page", "1")]);
        store.set(list.clone(), CachedData::document(json!([])));
        let detail = CacheKey::detail(Domain::Reminders, 42);
        store.set(detail.clone(), CachedData::document(json!({ "id": 42 })));

        let err = executor
            .perform(Mutation::new(
                MutationKind::ReminderDeleted { id: 42 },
                Method::DELETE,
                "/reminder/42",
            ))
            .await
            .expect_err("rejected");

        assert_eq!(err, TransportError::server(422, "title required"));
        assert!(!store.get(&list).expect("list").is_stale);
        assert!(store.get(&detail).is_some());
    }

    #[tokio::test]
    async fn delete_removes_detail_and_refetches_subscribed_list() {
        let (executor, transport) = setup(vec![
            Ok(Envelope::ok(Value::Null)),
            Ok(Envelope::ok(json!([{ "id": 41 }]))),
        ]);
        let queries = executor.queries.clone();
        let list = CacheKey::list(Domain::Reminders, &[("page", "1")]);
        let detail = CacheKey::detail(Domain::Reminders, 42);
        queries.store().set(detail.clone(), CachedData::document(json!({ "id": 42 })));

        let fetch_transport = transport.clone();
        let query = QueryFn::document(move || {
            let transport = fetch_transport.clone();
            async move { transport.data(ApiRequest::get("/reminder")).await }
        });
        queries.store().set(list.clone(), CachedData::document(json!([{ "id": 41 }, { "id": 42 }])));
        queries.resolve(list.clone(), query, queries.default_options());
        let mut sub = queries.subscribe(list.clone());

        executor
            .perform(Mutation::new(
                MutationKind::ReminderDeleted { id: 42 },
                Method::DELETE,
                "/reminder/42",
            ))
            .await
            .expect("deleted");

        assert!(queries.store().get(&detail).is_none());
        let refreshed = loop {
            let snapshot = sub.changed().await.expect("list alive");
            if snapshot.status == QueryStatus::Success && !snapshot.is_stale {
                break snapshot;
            }
        };
        assert_eq!(
            refreshed.data.as_ref().and_then(CachedData::as_document),
            Some(&json!([{ "id": 41 }]))
        );
    }

    #[tokio::test]
    async fn record_less_response_invalidates_detail_instead() {
        let (executor, _) = setup(vec![Ok(Envelope::ok(Value::Null))]);
        let store = executor.queries.store().clone();
        let detail = CacheKey::detail(Domain::Reminders, 5);
        store.set(
            detail.clone(),
            CachedData::document(json!({ "id": 5, "status": "active" })),
        );

        executor
            .perform(Mutation::new(
                MutationKind::ReminderCompleted { id: 5 },
                Method::PATCH,
                "/reminder/5/complete",
            ))
            .await
            .expect("completed");

        let snapshot = store.get(&detail).expect("detail kept");
        assert!(snapshot.is_stale);
        assert_eq!(
            snapshot.data.as_ref().and_then(CachedData::as_document),
            Some(&json!({ "id": 5, "status": "active" }))
        );
    }

    #[tokio::test]
    async fn unsubscribed_entries_are_only_marked_stale() {
        let (executor, transport) = setup(vec![Ok(Envelope::ok(json!({ "id": 5, "name": "x" })))]);
        let tags = CacheKey::new(Domain::Tags, Scope::List);
        executor
            .queries
            .store()
            .set(tags.clone(), CachedData::document(json!([])));

        executor
            .perform(Mutation::new(MutationKind::TagUpdated { id: 5 }, Method::PATCH, "/tag/5"))
            .await
            .expect("updated");

        assert!(executor.queries.store().get(&tags).expect("tags").is_stale);
        assert_eq!(transport.sent.lock().expect("sent").len(), 1);
        assert!(
            executor
                .queries
                .store()
                .keys()
                .iter()
                .any(|key| KeyPrefix::scope(Domain::Tags, Scope::Detail).matches(key))
        );
    }
}
