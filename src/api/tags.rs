//! Tags.

use dayboard_api_types::{TagCreateRequest, TagUpdateRequest};
use reqwest::Method;

use crate::cache::{CacheKey, Domain};
use crate::infra::error::TransportError;
use crate::infra::transport::ApiRequest;
use crate::mutation::{Mutation, MutationKind};

use super::{QuerySpec, SharedTransport, document_query};

pub const ITEMS_FIELD: &str = "tags";

/// The tag list is not paged and takes no filter.
pub fn list_key() -> CacheKey {
    CacheKey::list::<&str, &str>(Domain::Tags, &[])
}

pub fn detail_key(id: i64) -> CacheKey {
    CacheKey::detail(Domain::Tags, id)
}

pub fn list_query(transport: &SharedTransport) -> QuerySpec {
    QuerySpec::new(list_key(), document_query(transport, ApiRequest::get("/tag")))
}

pub fn detail_query(transport: &SharedTransport, id: i64) -> QuerySpec {
    let request = ApiRequest::get(format!("/tag/{id}"));
    QuerySpec::new(detail_key(id), document_query(transport, request))
}

pub fn create(request: &TagCreateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(MutationKind::TagCreated, Method::POST, "/tag").with_body(request)
}

pub fn update(id: i64, request: &TagUpdateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::TagUpdated { id },
        Method::PATCH,
        format!("/tag/{id}"),
    )
    .with_body(request)
}

pub fn delete(id: i64) -> Mutation {
    Mutation::new(
        MutationKind::TagDeleted { id },
        Method::DELETE,
        format!("/tag/{id}"),
    )
}
