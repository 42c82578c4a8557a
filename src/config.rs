use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RENEWAL_MARGIN_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SERVICE_URL,
};
use crate::error::AppResult;
use crate::utils::env_utils::{read_env, read_env_bool, read_env_opt, read_env_u64};

/// Backend microservices the console talks to. Each one has its own base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Service {
    Auth,
    User,
    Communication,
    Document,
    Template,
    Translation,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Auth,
        Service::User,
        Service::Communication,
        Service::Document,
        Service::Template,
        Service::Translation,
    ];

    fn env_key(self) -> &'static str {
        match self {
            Service::Auth => "AUTH_SERVICE_URL",
            Service::User => "USER_SERVICE_URL",
            Service::Communication => "COMMUNICATION_SERVICE_URL",
            Service::Document => "DOCUMENT_SERVICE_URL",
            Service::Template => "TEMPLATE_SERVICE_URL",
            Service::Translation => "TRANSLATION_SERVICE_URL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUrls {
    pub auth: String,
    pub user: String,
    pub communication: String,
    pub document: String,
    pub template: String,
    pub translation: String,
}

impl ServiceUrls {
    /// Every service pointed at the same base URL
    pub fn uniform(base_url: &str) -> Self {
        Self {
            auth: base_url.to_string(),
            user: base_url.to_string(),
            communication: base_url.to_string(),
            document: base_url.to_string(),
            template: base_url.to_string(),
            translation: base_url.to_string(),
        }
    }

    pub fn get(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth,
            Service::User => &self.user,
            Service::Communication => &self.communication,
            Service::Document => &self.document,
            Service::Template => &self.template,
            Service::Translation => &self.translation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub services: ServiceUrls,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub renewal_margin_secs: u64,
    /// Keep tokens in memory only instead of the OS keyring
    pub use_session_storage: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            services: ServiceUrls::uniform(DEFAULT_SERVICE_URL),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            renewal_margin_secs: DEFAULT_RENEWAL_MARGIN_SECS,
            use_session_storage: false,
        }
    }
}

impl RuntimeConfig {
    /// Build the configuration from the process environment.
    /// Services without their own URL inherit the auth service URL.
    pub fn from_env() -> Self {
        let auth = read_env(Service::Auth.env_key(), DEFAULT_SERVICE_URL);
        let inherit = |service: Service| read_env_opt(service.env_key()).unwrap_or_else(|| auth.clone());

        let config = Self {
            services: ServiceUrls {
                user: inherit(Service::User),
                communication: inherit(Service::Communication),
                document: inherit(Service::Document),
                template: inherit(Service::Template),
                translation: inherit(Service::Translation),
                auth: auth.clone(),
            },
            connect_timeout_secs: read_env_u64("HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout_secs: read_env_u64("HTTP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            renewal_margin_secs: read_env_u64("TOKEN_RENEWAL_MARGIN_SECS", DEFAULT_RENEWAL_MARGIN_SECS),
            use_session_storage: read_env_bool("USE_SESSION_STORAGE", false),
        };

        info!("Runtime configuration loaded, auth service at {}", config.services.auth);
        for service in Service::ALL {
            debug!("{:?} service URL: {}", service, config.services.get(service));
        }
        config
    }

    /// Parsed base URL of one service
    pub fn service_url(&self, service: Service) -> AppResult<Url> {
        Ok(Url::parse(self.services.get(service))?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn renewal_margin(&self) -> Duration {
        Duration::from_secs(self.renewal_margin_secs)
    }
}
