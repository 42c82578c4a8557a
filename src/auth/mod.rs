pub mod renewal_scheduler;
pub mod secure_storage_trait;
pub mod token_introspection;
pub mod token_manager;
pub mod token_persistence;
pub mod token_store;

pub use renewal_scheduler::RenewalTask;
pub use secure_storage_trait::SecureStorage;
pub use token_manager::{AuthSession, SessionStatus, TokenManager};
pub use token_persistence::{KeyringStorage, MemoryStorage};
pub use token_store::{TokenKind, TokenStore};
