//! Absolute URLs for response links.

use axum::http::{HeaderMap, Uri, header};

use crate::services::PageLinks;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Absolute URL of the request, without its query string.
///
/// `uri` must be the original request URI so paths under a nested router keep their
/// prefix.
pub fn request_url(headers: &HeaderMap, uri: &Uri) -> String {
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or("localhost");
    format!("{}://{}{}", scheme, host, uri.path())
}

/// Page links for a listing request. `query` is the decoded query string in request
/// order.
pub fn page_links(headers: &HeaderMap, uri: &Uri, query: Vec<(String, String)>) -> PageLinks {
    PageLinks::new(request_url(headers, uri), query)
}
