//! Key manager.
//!
//! Owns one [`CredentialStore`], puts a time-bounded read-through cache in
//! front of it and exposes app/key lookup, validation and mutation with a
//! uniform [`AuthError`] taxonomy.
//!
//! ```text
//! get_app_config(app_id)
//!   → cache enabled and entry younger than cache_expiry? return snapshot
//!   → otherwise read the store (bounded by store_timeout)
//!   → present? refresh cache entry, return
//! ```
//!
//! One instance is meant to be shared (`Arc<KeyManager>`) by every in-flight
//! request.

pub mod cache;

pub use cache::{AppCache, CacheLookup, CacheStats};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api_auth::error::AuthError;
use crate::api_auth::models::{
    AppConfig, AppConfigUpdate, DEFAULT_KEY_ID, KeyPair, SignatureAlgorithm,
};
use crate::clock::{Clock, SystemClock};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, Diagnostics};
use crate::store::{self, CredentialStore, DEFAULT_ENV_PREFIX, StorageKind, StoreError};

/// Public key returned by [`KeyManager::generate_key_pair`].
///
/// Key generation is not implemented; this value never verifies anything.
pub const PLACEHOLDER_PUBLIC_KEY: &str =
    "-----BEGIN PUBLIC KEY-----\nPLACEHOLDER-NOT-A-REAL-KEY\n-----END PUBLIC KEY-----";

/// Key manager configuration. Fixed for the lifetime of a [`KeyManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyManagerConfig {
    pub storage: StorageKind,
    pub cache_enabled: bool,
    pub cache_expiry_secs: u64,
    pub debug: bool,
    /// Variable prefix for [`StorageKind::Env`]
    pub env_prefix: String,
    /// Upper bound on a single store call
    pub store_timeout_ms: Option<u64>,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Env,
            cache_enabled: true,
            cache_expiry_secs: 300, // 5 minutes
            debug: false,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            store_timeout_ms: None,
        }
    }
}

impl KeyManagerConfig {
    fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }
}

pub struct KeyManager {
    config: KeyManagerConfig,
    store: Arc<dyn CredentialStore>,
    cache: AppCache,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
}

impl KeyManager {
    /// Create a manager over the store selected by `config.storage`.
    pub fn new(config: KeyManagerConfig) -> Self {
        let store = store::build_store(config.storage, &config.env_prefix);
        Self::with_store(config, store)
    }

    /// Create a manager over an explicit store.
    pub fn with_store(config: KeyManagerConfig, store: Arc<dyn CredentialStore>) -> Self {
        let diagnostics = Diagnostics::tracing(config.debug);
        Self {
            cache: AppCache::new(config.cache_expiry_secs),
            config,
            store,
            clock: Arc::new(SystemClock),
            diagnostics,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Diagnostics::new(sink, self.config.debug);
        self
    }

    pub fn config(&self) -> &KeyManagerConfig {
        &self.config
    }

    /// The clock used for cache age and key expiry.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Get an app's config, from cache when fresh.
    ///
    /// Store failures surface as `STORAGE_ERROR` unless the store already
    /// classified them.
    pub async fn get_app_config(&self, app_id: &str) -> Result<Option<AppConfig>, AuthError> {
        if self.config.cache_enabled {
            match self.cache.lookup(app_id, self.clock.now()) {
                CacheLookup::Hit(config) => {
                    self.diagnostics.emit(DiagnosticEvent::CacheHit { app_id });
                    return Ok(Some(config));
                }
                CacheLookup::Stale { age_ms } => {
                    self.diagnostics
                        .emit(DiagnosticEvent::CacheStale { app_id, age_ms });
                }
                CacheLookup::Miss => {
                    self.diagnostics.emit(DiagnosticEvent::CacheMiss { app_id });
                }
            }
        }

        let fetched = self.read_store(app_id).await?;
        self.diagnostics.emit(DiagnosticEvent::StoreRead {
            app_id,
            found: fetched.is_some(),
        });

        if self.config.cache_enabled {
            match &fetched {
                Some(config) => self.cache.insert(config.clone(), self.clock.now()),
                None => self.cache.remove(app_id),
            }
        }
        Ok(fetched)
    }

    /// Resolve the key a request names.
    ///
    /// - `Ok(None)`: no such app
    /// - `APP_NOT_FOUND` (403): app disabled
    /// - `KEY_NOT_FOUND`: key missing, disabled or expired
    ///
    /// `key_id` defaults to `"default"`.
    pub async fn resolve_key(
        &self,
        app_id: &str,
        key_id: Option<&str>,
    ) -> Result<Option<KeyPair>, AuthError> {
        let Some(app) = self.get_app_config(app_id).await? else {
            return Ok(None);
        };
        if !app.enabled {
            return Err(AuthError::app_disabled(app_id));
        }

        let key_id = key_id.unwrap_or(DEFAULT_KEY_ID);
        let key = match app.key(key_id) {
            Some(key) => key,
            None => {
                return Err(self
                    .reject_key(app_id, key_id, "missing")
                    .with_context("availableKeys", app.key_ids()));
            }
        };
        if !key.enabled {
            return Err(self.reject_key(app_id, key_id, "disabled"));
        }
        if key.is_expired_at(self.clock.now()) {
            return Err(self.reject_key(app_id, key_id, "expired"));
        }
        Ok(Some(key.clone()))
    }

    /// Get the public key material for `app_id`/`key_id`. See [`Self::resolve_key`].
    pub async fn get_public_key(
        &self,
        app_id: &str,
        key_id: Option<&str>,
    ) -> Result<Option<String>, AuthError> {
        Ok(self
            .resolve_key(app_id, key_id)
            .await?
            .map(|key| key.public_key))
    }

    /// True iff the app exists and is enabled. Never fails.
    pub async fn validate_app(&self, app_id: &str) -> bool {
        match self.get_app_config(app_id).await {
            Ok(Some(app)) => app.enabled,
            Ok(None) => false,
            Err(_) => false,
        }
    }

    /// Persist a new or replacement app and refresh its cache entry.
    pub async fn add_app(&self, config: AppConfig) -> Result<(), AuthError> {
        config.validate()?;
        self.write_store(config.clone()).await?;
        self.diagnostics.emit(DiagnosticEvent::AppSaved {
            app_id: &config.app_id,
            keys: config.keys.len(),
        });
        if self.config.cache_enabled {
            self.cache.insert(config, self.clock.now());
        }
        Ok(())
    }

    /// Merge `updates` over the stored app. `app_id` and `created_at` never
    /// change.
    pub async fn update_app(
        &self,
        app_id: &str,
        updates: AppConfigUpdate,
    ) -> Result<AppConfig, AuthError> {
        let existing = self
            .get_app_config(app_id)
            .await?
            .ok_or_else(|| AuthError::app_not_found(app_id))?;

        let merged = updates.apply_to(&existing);
        self.add_app(merged.clone()).await?;
        Ok(merged)
    }

    /// Validate `algorithm` and return a placeholder credential.
    ///
    /// Cryptographic generation is out of scope: the returned `public_key`
    /// is [`PLACEHOLDER_PUBLIC_KEY`] and must not be registered as usable.
    pub fn generate_key_pair(&self, algorithm: &str) -> Result<KeyPair, AuthError> {
        let algorithm: SignatureAlgorithm = algorithm.parse()?;
        Ok(KeyPair::new(
            format!("key-{}", uuid::Uuid::new_v4().simple()),
            PLACEHOLDER_PUBLIC_KEY,
            algorithm,
            self.clock.now(),
        ))
    }

    /// Drop every cache entry.
    pub fn clear_cache(&self) {
        let entries = self.cache.clear();
        self.diagnostics
            .emit(DiagnosticEvent::CacheCleared { entries });
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn read_store(&self, app_id: &str) -> Result<Option<AppConfig>, AuthError> {
        let result = match self.config.store_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.store.get_app_config(app_id))
                .await
                .unwrap_or(Err(StoreError::Timeout(limit))),
            None => self.store.get_app_config(app_id).await,
        };
        result.map_err(|e| self.wrap_store_error(e, "read", app_id))
    }

    async fn write_store(&self, config: AppConfig) -> Result<(), AuthError> {
        let app_id = config.app_id.clone();
        let result = match self.config.store_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.store.save_app_config(config))
                .await
                .unwrap_or(Err(StoreError::Timeout(limit))),
            None => self.store.save_app_config(config).await,
        };
        result.map_err(|e| self.wrap_store_error(e, "write", &app_id))
    }

    fn wrap_store_error(&self, err: StoreError, operation: &str, app_id: &str) -> AuthError {
        self.diagnostics.emit(DiagnosticEvent::StoreFailure {
            app_id,
            detail: err.to_string(),
        });
        match err {
            StoreError::Auth(classified) => classified,
            other => AuthError::storage(format!("Credential store {} failed: {}", operation, other))
                .with_context("appId", app_id)
                .with_context("operation", operation),
        }
    }

    fn reject_key(&self, app_id: &str, key_id: &str, reason: &'static str) -> AuthError {
        self.diagnostics.emit(DiagnosticEvent::KeyRejected {
            app_id,
            key_id,
            reason,
        });
        AuthError::key_not_found(app_id, key_id, reason)
    }
}
