use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serde JSON error: {0}")]
    SerdeError(String),

    #[error("HTTP client error: {0}")]
    HttpError(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::KeyringError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::InternalError(error)
    }
}

impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::InternalError(error.to_string())
    }
}

// A serializable version of AppError for handing to a UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializableError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<AppError> for SerializableError {
    fn from(error: AppError) -> Self {
        let code = match error {
            AppError::IoError(_) => "IO_ERROR",
            AppError::SerdeError(_) => "SERDE_ERROR",
            AppError::HttpError(_) => "HTTP_ERROR",
            AppError::KeyringError(_) => "KEYRING_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT_ERROR",
            AppError::NetworkError(_) => "NETWORK_ERROR",
            AppError::InvalidResponse(_) => "INVALID_RESPONSE_ERROR",
            AppError::StorageError(_) => "STORAGE_ERROR",
        }
        .to_string();

        SerializableError {
            code,
            message: error.to_string(),
            details: None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
