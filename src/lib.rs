pub mod api_clients;
pub mod auth;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod models;
pub mod navigation;
pub mod utils;

pub use api_clients::{AuthApiClient, HttpRequestClient, HttpTransport, ListQuery, ReqwestTransport};
pub use auth::{AuthSession, SessionStatus, TokenManager};
pub use config::{RuntimeConfig, Service};
pub use context::CoreMsContext;
pub use error::{AppError, AppResult};
pub use models::{Envelope, ErrorDetail, SessionUser};
pub use navigation::{InMemoryNavigator, Navigator};
