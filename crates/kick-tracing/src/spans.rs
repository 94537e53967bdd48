//! Span builders for the dispatch path.
//!
//! Each macro declares its late-bound fields as `Empty` so they can be filled
//! in with `Span::record` once the outcome is known.

/// Span around one `Dispatcher::send` call.
///
/// Usage: `let span = dispatch_request_span!(method, endpoint);`
///
/// Recorded later:
/// - `status`: final normalized status code
/// - `attempts`: attempts actually made
#[macro_export]
macro_rules! dispatch_request_span {
    ($method:expr, $endpoint:expr) => {
        tracing::info_span!(
            "dispatch_request",
            method = %$method,
            endpoint = %$endpoint,
            status = tracing::field::Empty,
            attempts = tracing::field::Empty,
        )
    };
}

/// Span around a single upstream attempt inside the retry loop.
#[macro_export]
macro_rules! dispatch_attempt_span {
    ($attempt:expr, $max:expr) => {
        tracing::debug_span!(
            "dispatch_attempt",
            attempt = $attempt,
            max_attempts = $max,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Span around a bypass provider round trip.
#[macro_export]
macro_rules! bypass_fetch_span {
    ($provider:expr, $target:expr) => {
        tracing::info_span!(
            "bypass_fetch",
            provider = %$provider,
            target = %$target,
            attempts = tracing::field::Empty,
            cookie_count = tracing::field::Empty,
        )
    };
}
