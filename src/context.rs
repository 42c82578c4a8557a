use log::info;
use std::sync::Arc;

use crate::api_clients::{AuthApiClient, HttpRequestClient, HttpTransport, create_transport};
use crate::auth::{KeyringStorage, MemoryStorage, SecureStorage, TokenManager, TokenStore};
use crate::config::{RuntimeConfig, Service};
use crate::error::AppResult;
use crate::navigation::Navigator;

/// One request client per backend service, all sharing the transport and token store
#[derive(Debug)]
pub struct ServiceClients {
    auth: Arc<HttpRequestClient>,
    user: Arc<HttpRequestClient>,
    communication: Arc<HttpRequestClient>,
    document: Arc<HttpRequestClient>,
    template: Arc<HttpRequestClient>,
    translation: Arc<HttpRequestClient>,
}

impl ServiceClients {
    fn build(config: &RuntimeConfig, transport: &Arc<dyn HttpTransport>, tokens: &Arc<TokenStore>) -> AppResult<Self> {
        let client = |service: Service| -> AppResult<Arc<HttpRequestClient>> {
            let base_url = config.service_url(service)?;
            info!("{:?} service client at {}", service, base_url);
            Ok(Arc::new(HttpRequestClient::new(
                base_url,
                Arc::clone(transport),
                Arc::clone(tokens),
            )))
        };

        Ok(Self {
            auth: client(Service::Auth)?,
            user: client(Service::User)?,
            communication: client(Service::Communication)?,
            document: client(Service::Document)?,
            template: client(Service::Template)?,
            translation: client(Service::Translation)?,
        })
    }

    pub fn get(&self, service: Service) -> Arc<HttpRequestClient> {
        let client = match service {
            Service::Auth => &self.auth,
            Service::User => &self.user,
            Service::Communication => &self.communication,
            Service::Document => &self.document,
            Service::Template => &self.template,
            Service::Translation => &self.translation,
        };
        Arc::clone(client)
    }
}

/// Everything the console needs, wired once at startup and passed around explicitly.
#[derive(Debug)]
pub struct CoreMsContext {
    config: RuntimeConfig,
    clients: ServiceClients,
    auth: AuthApiClient,
    token_manager: Arc<TokenManager>,
}

impl CoreMsContext {
    pub fn new(
        config: RuntimeConfig,
        storage: Arc<dyn SecureStorage>,
        transport: Arc<dyn HttpTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> AppResult<Self> {
        let tokens = Arc::new(TokenStore::new(storage));
        let clients = ServiceClients::build(&config, &transport, &tokens)?;
        let auth = AuthApiClient::new(clients.get(Service::Auth));
        let token_manager = TokenManager::new(auth.clone(), tokens, navigator, config.renewal_margin());

        Ok(Self {
            config,
            clients,
            auth,
            token_manager,
        })
    }

    /// Wire the production stack: reqwest transport plus keyring or in-memory token storage
    pub fn from_config(config: RuntimeConfig, navigator: Arc<dyn Navigator>) -> AppResult<Self> {
        let storage: Arc<dyn SecureStorage> = if config.use_session_storage {
            info!("Keeping tokens in memory for this session only");
            Arc::new(MemoryStorage::new())
        } else {
            Arc::new(KeyringStorage::new())
        };
        let transport = create_transport(&config)?;
        Self::new(config, storage, transport, navigator)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn token_manager(&self) -> Arc<TokenManager> {
        Arc::clone(&self.token_manager)
    }

    pub fn auth(&self) -> &AuthApiClient {
        &self.auth
    }

    pub fn client(&self, service: Service) -> Arc<HttpRequestClient> {
        self.clients.get(service)
    }
}
