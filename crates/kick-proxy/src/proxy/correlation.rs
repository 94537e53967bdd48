//! Per-request correlation IDs.
//!
//! Every inbound request gets an ID that is attached to its tracing span and
//! echoed back to the client, so a user report can be matched to the log lines
//! of the dispatch (including all retries) it triggered.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Response header carrying the correlation ID.
pub const CORRELATION_HEADER: &str = "x-kick-proxy-request-id";

/// Generate a new correlation ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware: open a `proxy_request` span tagged with a fresh ID and add the
/// ID to the response headers.
pub async fn attach(request: Request, next: Next) -> Response {
    let id = generate_id();
    let span = tracing::info_span!(
        "proxy_request",
        correlation_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
