use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_DESCRIPTION};

/// One entry of a server-provided error list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub reason_code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorDetail {
    pub fn new(reason_code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            reason_code: reason_code.into(),
            description: description.into(),
            details: None,
        }
    }

    /// The synthetic entry reported when no structured server error is available
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_DESCRIPTION)
    }
}

/// Envelope every backend endpoint answers with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: bool,
    #[serde(default)]
    pub response: Option<T>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// Uniform result handed to callers of the request client.
///
/// Expected failures (HTTP errors, network errors, malformed bodies) are
/// always represented here rather than as `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub succeeded: bool,
    pub payload: Option<T>,
    pub errors: Vec<ErrorDetail>,
}

impl<T> Envelope<T> {
    pub fn success(payload: Option<T>) -> Self {
        Self {
            succeeded: true,
            payload,
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<ErrorDetail>) -> Self {
        Self {
            succeeded: false,
            payload: None,
            errors,
        }
    }

    pub fn unknown_error() -> Self {
        Self::failure(vec![ErrorDetail::unknown()])
    }

    /// Joined error descriptions, for logs and terminal output
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.description, e.reason_code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
