use async_trait::async_trait;
use keyring::{Entry, Error as KeyringError};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::RwLock;

use super::secure_storage_trait::SecureStorage;
use crate::constants::SERVICE_NAME_FOR_KEYRING;
use crate::error::{AppError, AppResult};

/// Session storage: tokens live only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with the given entries
    pub fn with_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: RwLock::new(items.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(e: impl std::fmt::Display) -> AppError {
    error!("Failed to acquire lock on session storage: {}", e);
    AppError::StorageError(format!("Session storage lock poisoned: {}", e))
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        debug!("Saving {} to session storage (in-memory)", key);
        self.items
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.items.read().map_err(poisoned)?.get(key).cloned())
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        debug!("Clearing {} from session storage", key);
        self.items.write().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// Durable storage in the OS keyring, one entry per key
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service_name: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service_name(SERVICE_NAME_FOR_KEYRING)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> AppResult<Entry> {
        Entry::new(&self.service_name, key).map_err(|e| {
            error!("Failed to create keyring entry - OS: {:?}, Error: {}", std::env::consts::OS, e);
            AppError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStorage for KeyringStorage {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        debug!("Saving {} to OS keyring (persistent storage)", key);
        self.entry(key)?.set_password(value).map_err(|e| {
            error!("Failed to store {} in keyring - OS: {:?}, Error: {}", key, std::env::consts::OS, e);
            AppError::KeyringError(format!("Failed to store {}: {}", key, e))
        })
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => {
                debug!("{} retrieved from keyring", key);
                Ok(Some(value))
            }
            Err(KeyringError::NoEntry) => {
                debug!("No {} entry found in keyring", key);
                Ok(None)
            }
            Err(e) => {
                error!("Keyring error - OS: {:?}, Details: {}", std::env::consts::OS, e);
                Err(AppError::KeyringError(format!("Failed to retrieve {}: {}", key, e)))
            }
        }
    }

    async fn remove_item(&self, key: &str) -> AppResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                debug!("{} cleared from keyring", key);
                Ok(())
            }
            Err(KeyringError::NoEntry) => {
                debug!("No {} found to clear in keyring (already empty)", key);
                Ok(())
            }
            Err(e) => {
                error!("Failed to clear {} from keyring: {}", key, e);
                Err(AppError::KeyringError(format!("Failed to clear {}: {}", key, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("refreshToken").await.unwrap().is_none());

        storage.set_item("refreshToken", "r-1").await.unwrap();
        storage.set_item("refreshToken", "r-2").await.unwrap();
        assert_eq!(storage.get_item("refreshToken").await.unwrap().as_deref(), Some("r-2"));

        storage.remove_item("refreshToken").await.unwrap();
        storage.remove_item("refreshToken").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_memory_storage_with_items() {
        let storage = MemoryStorage::with_items([("accessToken", "a"), ("refreshToken", "r")]);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get_item("accessToken").await.unwrap().as_deref(), Some("a"));
    }
}
