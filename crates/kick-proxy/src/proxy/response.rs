//! Uniform success/error envelope returned by the dispatcher.

use serde_json::Value;

use crate::error::DispatchError;

/// Outcome of one dispatched call, regardless of where a failure came from.
///
/// Fields are private so a response cannot be altered after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    status_code: u16,
    data: Option<Value>,
    error: Option<String>,
}

impl NormalizedResponse {
    /// A response carrying whatever status the upstream reported.
    /// A JSON `null` body is stored as `None`.
    pub fn new(status_code: u16, data: Option<Value>) -> Self {
        Self {
            status_code,
            data: data.filter(|v| !v.is_null()),
            error: None,
        }
    }

    /// A synthesized failure with an explanatory message.
    pub fn failure(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            status_code,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Map a dispatch error to a 500 envelope carrying its message.
    pub fn from_error(err: &DispatchError) -> Self {
        Self::failure(500, err.to_string())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && self.error.is_none()
    }
}
