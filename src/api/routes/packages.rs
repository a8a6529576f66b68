//! Flow package routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::app_state::AppState;
use super::error::ApiError;
use super::links::{page_links, request_url};
use super::responses;
use crate::models::ValidationErrors;
use crate::services::package_service::package_document;

/// Create the flow results router
pub fn packages_router() -> Router<AppState> {
    Router::new()
        .route(
            "/flow-results/packages",
            get(list_packages).post(create_package),
        )
        .route("/flow-results/packages/{id}", get(get_package))
        .route(
            "/flow-results/packages/{id}/responses",
            get(responses::list_responses).post(responses::create_responses),
        )
}

/// Decode a JSON request body, reporting malformed JSON as a validation error.
pub(crate) fn json_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add("detail", format!("JSON parse error - {}", e));
        ApiError::Validation(errors)
    })
}

/// Package id from the path. A malformed id cannot name a package.
pub(crate) fn package_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

/// GET /flow-results/packages - List flow packages
#[utoipa::path(
    get,
    path = "/flow-results/packages",
    tag = "Flow Results",
    params(
        ("page[size]" = Option<usize>, Query, description = "Page size, capped by the server page size"),
        ("page[afterCursor]" = Option<String>, Query, description = "Return packages after this package id"),
        ("page[beforeCursor]" = Option<String>, Query, description = "Return packages before this package id")
    ),
    responses(
        (status = 200, description = "One page of packages", body = Object)
    )
)]
pub async fn list_packages(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let links = page_links(&headers, &uri, query.clone());
    let page = state.package_service().list_packages(&query, &links).await?;
    Ok(Json(page))
}

/// POST /flow-results/packages - Create a flow package
#[utoipa::path(
    post,
    path = "/flow-results/packages",
    tag = "Flow Results",
    request_body(content = Object, description = "Flow results package document"),
    responses(
        (status = 201, description = "Package created", body = Object),
        (status = 400, description = "Package failed validation", body = Object)
    )
)]
pub async fn create_package(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(&body)?;
    let submission = state
        .package_service()
        .create_package(&body)
        .await
        .inspect_err(|e| warn!("[POST /flow-results/packages] Rejected package: {}", e))?;

    let package_url = format!(
        "{}/{}",
        request_url(&headers, &uri).trim_end_matches('/'),
        submission.flow.id
    );
    info!(
        "[POST /flow-results/packages] Created package {}",
        submission.flow.id
    );
    Ok((
        StatusCode::CREATED,
        Json(package_document(
            &submission.flow,
            &submission.questions,
            &package_url,
        )),
    ))
}

/// GET /flow-results/packages/{id} - Get one flow package
#[utoipa::path(
    get,
    path = "/flow-results/packages/{id}",
    tag = "Flow Results",
    params(
        ("id" = Uuid, Path, description = "Package UUID")
    ),
    responses(
        (status = 200, description = "Package with its question schema", body = Object),
        (status = 404, description = "Package not found")
    )
)]
pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let id = package_id(&id)?;
    let (stored, questions) = state.package_service().get_package(id).await?;
    let package_url = request_url(&headers, &uri);
    Ok(Json(package_document(&stored.flow, &questions, &package_url)))
}
