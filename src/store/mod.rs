//! Credential stores.
//!
//! A [`CredentialStore`] durably holds [`AppConfig`] records. Two variants
//! ship with the crate and are selected through [`StorageKind`]:
//!
//! | Variant | Use Case |
//! |---------|----------|
//! | [`StorageKind::Env`] | Production provisioning through the deployment environment |
//! | [`StorageKind::Memory`] | Tests, development, ephemeral setups |

pub mod env;
pub mod memory;

pub use env::{DEFAULT_ENV_PREFIX, EnvCredentialStore};
pub use memory::MemoryCredentialStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api_auth::error::AuthError;
use crate::api_auth::models::AppConfig;

/// Store failure.
///
/// `Auth` carries an error that is already classified and must reach the
/// caller unchanged; anything else is wrapped as `STORAGE_ERROR` by the key
/// manager.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable holder of per-application configuration.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an app. Absence is `Ok(None)`, never an error.
    async fn get_app_config(&self, app_id: &str) -> Result<Option<AppConfig>, StoreError>;

    /// Upsert by `app_id`, replacing any previous record entirely.
    async fn save_app_config(&self, config: AppConfig) -> Result<(), StoreError>;
}

/// Storage provider tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Env,
    Memory,
}

/// Build the store named by `kind`.
pub fn build_store(kind: StorageKind, env_prefix: &str) -> Arc<dyn CredentialStore> {
    match kind {
        StorageKind::Env => Arc::new(EnvCredentialStore::from_process_env(env_prefix)),
        StorageKind::Memory => Arc::new(MemoryCredentialStore::new()),
    }
}
