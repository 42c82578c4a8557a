use log::{debug, error, warn};
use serde::Deserialize;
use serde_json::Value;

use super::transport::TransportResponse;
use crate::error::AppError;
use crate::models::{ApiResponse, Envelope, ErrorDetail};

/// Error body returned by the backend services on failure
#[derive(Debug, Deserialize)]
struct ServerErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

/// Extract the server-provided error list from a failed response.
/// Falls back to the synthetic `unknown.error` entry when there is none.
pub fn map_error_response(status_code: u16, response_text: &str) -> Vec<ErrorDetail> {
    debug!("Mapping error response: status={}, response={}", status_code, response_text);

    match serde_json::from_str::<ServerErrorResponse>(response_text) {
        Ok(body) if !body.errors.is_empty() => body.errors,
        _ => {
            error!(
                "Request failed without a structured error body (HTTP {}): {}",
                status_code, response_text
            );
            vec![ErrorDetail::unknown()]
        }
    }
}

/// Normalize a transport outcome into the uniform envelope
pub fn envelope_from_response(response: &TransportResponse) -> Envelope<Value> {
    if !response.is_success() {
        return Envelope::failure(map_error_response(response.status, &response.body));
    }

    if response.body.trim().is_empty() {
        return Envelope::success(None);
    }

    let value: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            error!("Malformed response body (HTTP {}): {}", response.status, e);
            return Envelope::unknown_error();
        }
    };

    if !is_api_response(&value) {
        return Envelope::success(Some(value));
    }

    match serde_json::from_value::<ApiResponse<Value>>(value) {
        Ok(api) if api.result => Envelope::success(api.response.filter(|v| !v.is_null())),
        Ok(api) if !api.errors.is_empty() => {
            warn!("Backend reported failure with HTTP {}", response.status);
            Envelope::failure(api.errors)
        }
        Ok(_) => {
            error!("Backend reported failure without errors (HTTP {})", response.status);
            Envelope::unknown_error()
        }
        Err(e) => {
            error!("Malformed response envelope (HTTP {}): {}", response.status, e);
            Envelope::unknown_error()
        }
    }
}

/// A transport error never carries a server error list
pub fn envelope_from_transport_error(err: &AppError) -> Envelope<Value> {
    error!("Request failed before a response was received: {}", err);
    Envelope::unknown_error()
}

fn is_api_response(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.get("result").is_some_and(Value::is_boolean))
}
