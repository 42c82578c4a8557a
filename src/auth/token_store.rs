use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::secure_storage_trait::SecureStorage;
use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn storage_key(self) -> &'static str {
        match self {
            TokenKind::Access => ACCESS_TOKEN_KEY,
            TokenKind::Refresh => REFRESH_TOKEN_KEY,
        }
    }
}

/// In-memory copy of the session tokens, written through to durable storage.
///
/// Shared by the request client (reads the access token for bearer auth) and
/// the token manager (the only writer).
#[derive(Debug)]
pub struct TokenStore {
    access: RwLock<Option<String>>,
    refresh: RwLock<Option<String>>,
    backend: Arc<dyn SecureStorage>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self {
            access: RwLock::new(None),
            refresh: RwLock::new(None),
            backend,
        }
    }

    fn slot(&self, kind: TokenKind) -> &RwLock<Option<String>> {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Current token, loading it from durable storage on first use
    pub async fn get(&self, kind: TokenKind) -> Option<String> {
        let mut token_guard = self.slot(kind).write().await;
        if token_guard.is_some() {
            return token_guard.clone();
        }

        match self.backend.get_item(kind.storage_key()).await {
            Ok(Some(stored_token)) => {
                debug!("TokenStore: Loaded {} from durable storage.", kind.storage_key());
                *token_guard = Some(stored_token.clone());
                Some(stored_token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "TokenStore: Failed to read {} from durable storage: {}. Operating in-memory.",
                    kind.storage_key(),
                    e
                );
                None
            }
        }
    }

    /// Replace a token in memory and durable storage. `None` clears it.
    pub async fn set(&self, kind: TokenKind, new_token: Option<String>) -> AppResult<()> {
        let mut token_guard = self.slot(kind).write().await;
        *token_guard = new_token.clone();

        match new_token {
            Some(token_to_store) => self.backend.set_item(kind.storage_key(), &token_to_store).await?,
            None => self.backend.remove_item(kind.storage_key()).await?,
        }
        debug!("TokenStore: {} updated.", kind.storage_key());
        Ok(())
    }

    /// Clear both tokens. Every key is attempted even if one fails.
    pub async fn clear(&self) -> AppResult<()> {
        let access = self.set(TokenKind::Access, None).await;
        let refresh = self.set(TokenKind::Refresh, None).await;
        access.and(refresh)
    }
}
