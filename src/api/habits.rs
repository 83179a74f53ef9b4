//! Habits: paged list, per-day view, details, stats, tag groups.

use dayboard_api_types::{
    HabitCreateRequest, HabitMarkRequest, HabitTagsRequest, HabitUpdateRequest,
};
use reqwest::Method;
use time::Date;

use crate::cache::{CacheKey, Domain, Scope, iso_date};
use crate::filter::QueryParams;
use crate::infra::error::TransportError;
use crate::infra::transport::ApiRequest;
use crate::mutation::{HabitMark, Mutation, MutationKind};

use super::{QuerySpec, SharedTransport, document_query, paged_query};

pub const ITEMS_FIELD: &str = "habits";

pub fn list_key(params: &QueryParams) -> CacheKey {
    CacheKey::list(Domain::Habits, params)
}

pub fn for_date_key(date: Date) -> CacheKey {
    CacheKey::for_date(Domain::Habits, date)
}

pub fn detail_key(id: i64) -> CacheKey {
    CacheKey::detail(Domain::Habits, id)
}

pub fn stats_key() -> CacheKey {
    CacheKey::new(Domain::Habits, Scope::Stats)
}

pub fn grouped_key() -> CacheKey {
    CacheKey::new(Domain::Habits, Scope::Grouped)
}

/// `GET /habit`, paged.
pub fn list_query(transport: &SharedTransport, params: &QueryParams) -> QuerySpec {
    let request = ApiRequest::get("/habit").with_query(params);
    QuerySpec::new(list_key(params), paged_query(transport, request, ITEMS_FIELD))
}

/// `GET /habit/date/{date}`; decodes into [`HabitsForDate`](dayboard_api_types::HabitsForDate).
pub fn for_date_query(transport: &SharedTransport, date: Date) -> QuerySpec {
    let request = ApiRequest::get(format!("/habit/date/{}", iso_date(date)));
    QuerySpec::new(for_date_key(date), document_query(transport, request))
}

pub fn detail_query(transport: &SharedTransport, id: i64) -> QuerySpec {
    let request = ApiRequest::get(format!("/habit/{id}/details"));
    QuerySpec::new(detail_key(id), document_query(transport, request))
}

pub fn stats_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(
        stats_key(),
        document_query(transport, ApiRequest::get("/habit/stats")),
    )
}

pub fn grouped_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(
        grouped_key(),
        document_query(transport, ApiRequest::get("/habit-tag/grouped")),
    )
}

pub fn create(request: &HabitCreateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(MutationKind::HabitCreated, Method::POST, "/habit/create").with_body(request)
}

pub fn update(id: i64, request: &HabitUpdateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::HabitUpdated { id },
        Method::PATCH,
        format!("/habit/{id}"),
    )
    .with_body(request)
}

pub fn delete(id: i64) -> Mutation {
    Mutation::new(
        MutationKind::HabitDeleted { id },
        Method::DELETE,
        format!("/habit/{id}"),
    )
}

/// `POST /habit/{id}/done|skip|undo` for one day.
pub fn mark(id: i64, date: Date, mark: HabitMark) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::HabitMarked { id, date, mark },
        Method::POST,
        format!("/habit/{id}/{}", mark.as_str()),
    )
    .with_body(&HabitMarkRequest { date })
}

pub fn attach_tags(id: i64, tag_ids: Vec<i64>) -> Result<Mutation, TransportError> {
    tags_mutation(Method::POST, id, tag_ids)
}

pub fn detach_tags(id: i64, tag_ids: Vec<i64>) -> Result<Mutation, TransportError> {
    tags_mutation(Method::DELETE, id, tag_ids)
}

fn tags_mutation(method: Method, id: i64, tag_ids: Vec<i64>) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::HabitTagsChanged { id },
        method,
        format!("/habit-tag/{id}/tags"),
    )
    .with_body(&HabitTagsRequest { tag_ids })
}
