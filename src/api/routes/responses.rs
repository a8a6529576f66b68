//! Flow response routes, mounted under a package by the packages router.

use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;
use tracing::{info, warn};

use super::app_state::AppState;
use super::error::ApiError;
use super::links::page_links;
use super::packages::{json_body, package_id};

/// URL of the package owning a responses URL.
fn package_url(responses_url: &str) -> String {
    responses_url
        .trim_end_matches('/')
        .trim_end_matches("/responses")
        .to_string()
}

/// GET /flow-results/packages/{id}/responses - List a package's responses
#[utoipa::path(
    get,
    path = "/flow-results/packages/{id}/responses",
    tag = "Flow Results",
    params(
        ("id" = Uuid, Path, description = "Package UUID"),
        ("filter[start-timestamp]" = Option<String>, Query, description = "Only responses after this RFC 3339 timestamp"),
        ("filter[end-timestamp]" = Option<String>, Query, description = "Only responses at or before this RFC 3339 timestamp"),
        ("page[size]" = Option<usize>, Query, description = "Page size, capped by the server page size"),
        ("page[afterCursor]" = Option<String>, Query, description = "Return responses after the row with this row_id"),
        ("page[beforeCursor]" = Option<String>, Query, description = "Return responses before the row with this row_id")
    ),
    responses(
        (status = 200, description = "One page of responses", body = Object),
        (status = 404, description = "Package not found")
    )
)]
pub async fn list_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let id = package_id(&id)?;
    let links = page_links(&headers, &uri, query.clone());
    let package_url = package_url(links.base());
    let document = state
        .response_service()
        .list_responses(id, &query, &links, &package_url)
        .await?;
    Ok(Json(document))
}

/// POST /flow-results/packages/{id}/responses - Submit a batch of responses
#[utoipa::path(
    post,
    path = "/flow-results/packages/{id}/responses",
    tag = "Flow Results",
    params(
        ("id" = Uuid, Path, description = "Package UUID")
    ),
    request_body(content = Object, description = "Batch of response rows"),
    responses(
        (status = 204, description = "All responses stored"),
        (status = 400, description = "A response failed validation; nothing was stored", body = Object),
        (status = 404, description = "Package not found")
    )
)]
pub async fn create_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let id = package_id(&id)?;
    let body = json_body(&body)?;
    let count = state
        .response_service()
        .submit_responses(id, &body)
        .await
        .inspect_err(|e| {
            warn!(
                "[POST /flow-results/packages/{}/responses] Rejected batch: {}",
                id, e
            )
        })?;
    info!(
        "[POST /flow-results/packages/{}/responses] Stored {} response(s)",
        id, count
    );
    Ok(StatusCode::NO_CONTENT)
}
