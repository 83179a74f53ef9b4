//! Projects and their image sub-resource.

use dayboard_api_types::{ProjectCreateRequest, ProjectImageRequest, ProjectUpdateRequest};
use reqwest::Method;

use crate::cache::{CacheKey, Domain};
use crate::filter::QueryParams;
use crate::infra::error::TransportError;
use crate::infra::transport::ApiRequest;
use crate::mutation::graph::project_stats_key;
use crate::mutation::{Mutation, MutationKind};

use super::{QuerySpec, SharedTransport, document_query, paged_query};

pub const ITEMS_FIELD: &str = "projects";

pub fn list_key(params: &QueryParams) -> CacheKey {
    CacheKey::list(Domain::Projects, params)
}

pub fn detail_key(id: i64) -> CacheKey {
    CacheKey::detail(Domain::Projects, id)
}

pub fn stats_key(id: i64) -> CacheKey {
    project_stats_key(id)
}

pub fn list_query(transport: &SharedTransport, params: &QueryParams) -> QuerySpec {
    let request = ApiRequest::get("/project").with_query(params);
    QuerySpec::new(list_key(params), paged_query(transport, request, ITEMS_FIELD))
}

pub fn detail_query(transport: &SharedTransport, id: i64) -> QuerySpec {
    let request = ApiRequest::get(format!("/project/{id}"));
    QuerySpec::new(detail_key(id), document_query(transport, request))
}

pub fn stats_query(transport: &SharedTransport, id: i64) -> QuerySpec {
    let request = ApiRequest::get(format!("/project/{id}/stats"));
    QuerySpec::new(stats_key(id), document_query(transport, request))
}

pub fn create(request: &ProjectCreateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(MutationKind::ProjectCreated, Method::POST, "/project").with_body(request)
}

pub fn update(id: i64, request: &ProjectUpdateRequest) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::ProjectUpdated { id },
        Method::PATCH,
        format!("/project/{id}"),
    )
    .with_body(request)
}

pub fn delete(id: i64) -> Mutation {
    Mutation::new(
        MutationKind::ProjectDeleted { id },
        Method::DELETE,
        format!("/project/{id}"),
    )
}

pub fn add_image(project_id: i64, url: impl Into<String>) -> Result<Mutation, TransportError> {
    Mutation::new(
        MutationKind::ProjectImageAdded { project_id },
        Method::POST,
        format!("/project/{project_id}/images"),
    )
    .with_body(&ProjectImageRequest { url: url.into() })
}

pub fn remove_image(project_id: i64, image_id: i64) -> Mutation {
    Mutation::new(
        MutationKind::ProjectImageRemoved { project_id },
        Method::DELETE,
        format!("/project/{project_id}/images/{image_id}"),
    )
}

pub fn set_primary_image(project_id: i64, image_id: i64) -> Mutation {
    Mutation::new(
        MutationKind::ProjectImagePrimarySet { project_id },
        Method::PATCH,
        format!("/project/{project_id}/images/{image_id}/primary"),
    )
}
