//! Reminders: filtered paged list, upcoming and overdue views, details, stats.

use dayboard_api_types::{ReminderCreateRequest, ReminderSnoozeRequest, ReminderUpdateRequest};
use reqwest::Method;

use crate::cache::{CacheKey, Domain, Scope};
use crate::filter::QueryParams;
use crate::infra::error::TransportError;
use crate::infra::transport::ApiRequest;
use crate::mutation::{Mutation, MutationKind};

use super::{QuerySpec, SharedTransport, document_query, paged_query};

pub const ITEMS_FIELD: &str = "reminders";

pub fn list_key(params: &QueryParams) -> CacheKey {
    CacheKey::list(Domain::Reminders, params)
}

pub fn detail_key(id: i64) -> CacheKey {
    CacheKey::detail(Domain::Reminders, id)
}

pub fn upcoming_key() -> CacheKey {
    CacheKey::new(Domain::Reminders, Scope::Upcoming)
}

pub fn overdue_key() -> CacheKey {
    CacheKey::new(Domain::Reminders, Scope::Overdue)
}

pub fn stats_key() -> CacheKey {
    CacheKey::new(Domain::Reminders, Scope::Stats)
}

/// `GET /reminder` with compiled filter parameters, paged.
pub fn list_query(transport: &SharedTransport, params: &QueryParams) -> QuerySpec {
    let request = ApiRequest::get("/reminder").with_query(params);
    QuerySpec::new(list_key(params), paged_query(transport, request, ITEMS_FIELD))
}

pub fn detail_query(transport: &SharedTransport, id: i64) -> QuerySpec {
    let request = ApiRequest::get(format!("/reminder/{id}"));
    QuerySpec::new(detail_key(id), document_query(transport, request))
}

pub fn upcoming_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(
        upcoming_key(),
        document_query(transport, ApiRequest::get("/reminder/upcoming")),
    )
}

pub fn overdue_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(
        overdue_key(),
        document_query(transport, ApiRequest::get("/reminder/overdue")),
    )
}

pub fn stats_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(
        stats_key(),
        document_query(transport, ApiRequest::get("/reminder/stats")),
    )
}

pub fn create(request: &ReminderCreateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(MutationKind::ReminderCreated, Method::POST, "/reminder").with_body(request)
}

pub fn update(id: i64, request: &ReminderUpdateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::ReminderUpdated { id },
        Method::PATCH,
        format!("/reminder/{id}"),
    )
    .with_body(request)
}

pub fn complete(id: i64) -> Mutation {
    Mutation::new(
        MutationKind::ReminderCompleted { id },
        Method::POST,
        format!("/reminder/{id}/complete"),
    )
}

pub fn snooze(id: i64, minutes: u32) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::ReminderSnoozed { id },
        Method::POST,
        format!("/reminder/{id}/snooze"),
    )
    .with_body(&ReminderSnoozeRequest { minutes })
}

pub fn delete(id: i64) -> Mutation {
    Mutation::new(
        MutationKind::ReminderDeleted { id },
        Method::DELETE,
        format!("/reminder/{id}"),
    )
}
