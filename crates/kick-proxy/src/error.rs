//! Error kinds for bypass acquisition and upstream dispatch.

use thiserror::Error;

/// Failure of a single round trip to the bypass provider.
#[derive(Debug, Error)]
pub enum BypassAttemptError {
    #[error("bypass provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bypass server returned status {0}")]
    Status(u16),

    /// Body was not JSON, or lacked `cookies` / `user_agent`.
    #[error("malformed bypass payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("bypass payload has an empty user_agent")]
    EmptyUserAgent,
}

/// Errors surfaced by the dispatch core.
///
/// The `Display` text of each variant is what ends up in
/// [`NormalizedResponse::error`](crate::proxy::response::NormalizedResponse).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The provider could not produce clearance credentials within its own
    /// retry budget.
    #[error("Failed to obtain Cloudflare clearance after {attempts} attempts: {last}")]
    BypassAcquisition { attempts: u32, last: String },

    /// Network-level failure talking to the upstream target.
    #[error("{0}")]
    Transport(String),

    /// Upstream body was present but not valid JSON.
    #[error("Invalid JSON response")]
    Decode,

    /// Every attempt of the outer loop failed.
    #[error("Max retries exceeded")]
    ExhaustedRetries,

    #[error("Invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl DispatchError {
    pub fn is_bypass_failure(&self) -> bool {
        matches!(self, DispatchError::BypassAcquisition { .. })
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        DispatchError::Transport(e.to_string())
    }
}
