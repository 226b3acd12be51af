//! Request scope middleware
//!
//! Opens a [`RequestScope`] around every request so handlers and the
//! loaders they use share one registry, and every log line of the request
//! carries its id. The id comes from `x-request-id` when the caller sends
//! a usable one and is echoed back on the response.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use pokedex_core::RequestScope;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id accepted
const MAX_REQUEST_ID_LEN: usize = 128;

fn incoming_request_id(request: &Request) -> Option<String> {
    let value = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() || value.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    Some(value.to_owned())
}

pub async fn request_scope(request: Request, next: Next) -> Response {
    let scope = match incoming_request_id(&request) {
        Some(id) => RequestScope::new(id),
        None => RequestScope::generate(),
    };
    let header = HeaderValue::from_str(scope.request_id()).ok();

    let mut response = scope.run(next.run(request)).await;
    if let Some(header) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
    response
}
