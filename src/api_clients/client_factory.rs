use log::info;
use reqwest::Client;
use std::sync::Arc;

use super::transport::{HttpTransport, ReqwestTransport};
use crate::config::RuntimeConfig;
use crate::error::{AppError, AppResult};

/// Build the shared reqwest client with the configured timeouts
pub fn create_http_client(config: &RuntimeConfig) -> AppResult<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .user_agent(concat!("corems-console/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Transport shared by every service client
pub fn create_transport(config: &RuntimeConfig) -> AppResult<Arc<dyn HttpTransport>> {
    info!(
        "Creating HTTP transport (connect timeout {:?}, request timeout {:?})",
        config.connect_timeout(),
        config.request_timeout()
    );
    Ok(Arc::new(ReqwestTransport::new(create_http_client(config)?)))
}
