//! In-memory credential store.
//!
//! A plain concurrent map. Fully read/write, nothing survives a restart.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CredentialStore, StoreError};
use crate::api_auth::models::AppConfig;

/// Thread-safe in-memory store keyed by app id.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    apps: DashMap<String, AppConfig>,
}

impl MemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `apps`.
    pub fn with_apps(apps: impl IntoIterator<Item = AppConfig>) -> Self {
        let store = Self::new();
        for app in apps {
            store.apps.insert(app.app_id.clone(), app);
        }
        store
    }

    /// Get the number of stored apps.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_app_config(&self, app_id: &str) -> Result<Option<AppConfig>, StoreError> {
        Ok(self.apps.get(app_id).map(|entry| entry.value().clone()))
    }

    async fn save_app_config(&self, config: AppConfig) -> Result<(), StoreError> {
        self.apps.insert(config.app_id.clone(), config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_auth::models::{KeyPair, SignatureAlgorithm};
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_app_is_none() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get_app_config("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites_entirely() {
        let now = Utc::now();
        let store = MemoryCredentialStore::new();
        let first = AppConfig::new("shop", now).with_key(KeyPair::new(
            "default",
            "pem-a",
            SignatureAlgorithm::Rs256,
            now,
        ));
        store.save_app_config(first).await.unwrap();

        let mut second = AppConfig::new("shop", now);
        second.enabled = false;
        store.save_app_config(second.clone()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_app_config("shop").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_concurrent_saves() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut handles = vec![];
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let app = AppConfig::new(format!("app-{}", i % 4), Utc::now());
                store.save_app_config(app).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 4);
    }
}
