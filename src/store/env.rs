//! Environment-backed credential store.
//!
//! Builds [`AppConfig`] records lazily, per lookup, from a structured
//! variable namespace. With the default prefix `SIGNATURE_AUTH`:
//!
//! ```text
//! SIGNATURE_AUTH_APP_<APP>_ENABLED=true
//! SIGNATURE_AUTH_APP_<APP>_CREATED_AT=2024-01-01T00:00:00Z
//! SIGNATURE_AUTH_APP_<APP>_KEYS=default,key-2024
//! SIGNATURE_AUTH_APP_<APP>_KEY_<KEY>_PUBLIC_KEY=-----BEGIN PUBLIC KEY-----\n...
//! SIGNATURE_AUTH_APP_<APP>_KEY_<KEY>_ALGORITHM=ES256
//! SIGNATURE_AUTH_APP_<APP>_KEY_<KEY>_ENABLED=true
//! SIGNATURE_AUTH_APP_<APP>_KEY_<KEY>_EXPIRES_AT=2025-01-01T00:00:00Z
//!
//! # single "default" key shorthand, used when _KEYS is absent
//! SIGNATURE_AUTH_APP_<APP>_PUBLIC_KEY=...
//! SIGNATURE_AUTH_APP_<APP>_ALGORITHM=RS256
//! ```
//!
//! `<APP>` and `<KEY>` are the ids upper-cased with every non-alphanumeric
//! character replaced by `_`. Several ids share a segment, so each segment
//! answers to exactly one app id: the value of `SIGNATURE_AUTH_APP_<APP>_ID`
//! when set, otherwise the segment lower-cased (`MOBILE_APP` → `mobile_app`).
//! Any other id is absent. Key ids listed in `_KEYS` must map to distinct
//! segments.
//!
//! A malformed entry fails that app's lookup with `CONFIG_ERROR`; other apps
//! are unaffected.
//!
//! Saves go to an in-process overlay that shadows the environment for that
//! app until the process exits.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{CredentialStore, StoreError};
use crate::api_auth::error::AuthError;
use crate::api_auth::models::{AppConfig, DEFAULT_KEY_ID, KeyPair, SignatureAlgorithm};

/// Default variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "SIGNATURE_AUTH";

#[derive(Debug)]
enum EnvSource {
    /// Read the live process environment on every lookup
    Process,
    /// Fixed snapshot (tests, embedding)
    Fixed(HashMap<String, String>),
}

/// Read-mostly store over environment variables.
#[derive(Debug)]
pub struct EnvCredentialStore {
    prefix: String,
    source: EnvSource,
    overlay: DashMap<String, AppConfig>,
    /// `created_at` for apps that do not declare one
    loaded_at: DateTime<Utc>,
}

impl EnvCredentialStore {
    /// Store over the live process environment.
    pub fn from_process_env(prefix: &str) -> Self {
        Self::with_source(prefix, EnvSource::Process)
    }

    /// Store over a fixed set of variables.
    pub fn from_vars<K, V>(prefix: &str, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_source(prefix, EnvSource::Fixed(vars))
    }

    fn with_source(prefix: &str, source: EnvSource) -> Self {
        Self {
            prefix: prefix.trim_end_matches('_').to_string(),
            source,
            overlay: DashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    /// Variable name segment for an app or key id.
    pub fn segment(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Full variable name for an app-level setting.
    pub fn app_var(&self, app_id: &str, setting: &str) -> String {
        format!("{}_APP_{}_{}", self.prefix, Self::segment(app_id), setting)
    }

    /// Full variable name for a key-level setting.
    pub fn key_var(&self, app_id: &str, key_id: &str, setting: &str) -> String {
        format!(
            "{}_APP_{}_KEY_{}_{}",
            self.prefix,
            Self::segment(app_id),
            Self::segment(key_id),
            setting
        )
    }

    fn var(&self, name: &str) -> Option<String> {
        let value = match &self.source {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    /// The one app id the segment of `app_id` answers to.
    fn canonical_app_id(&self, app_id: &str) -> String {
        self.var(&self.app_var(app_id, "ID"))
            .unwrap_or_else(|| Self::segment(app_id).to_ascii_lowercase())
    }

    fn load_app(&self, app_id: &str) -> Result<Option<AppConfig>, AuthError> {
        if self.canonical_app_id(app_id) != app_id {
            return Ok(None);
        }

        let enabled = self.var(&self.app_var(app_id, "ENABLED"));
        let key_list = self.var(&self.app_var(app_id, "KEYS"));
        let shorthand_key = self.var(&self.app_var(app_id, "PUBLIC_KEY"));

        if enabled.is_none() && key_list.is_none() && shorthand_key.is_none() {
            return Ok(None);
        }

        let enabled = match enabled {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| malformed(app_id, &self.app_var(app_id, "ENABLED")))?,
            None => true,
        };
        let created_at = self
            .parse_time(app_id, &self.app_var(app_id, "CREATED_AT"))?
            .unwrap_or(self.loaded_at);

        let keys = match (key_list, shorthand_key) {
            (Some(list), _) => {
                let key_ids: Vec<&str> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .collect();
                let mut segments = HashSet::new();
                if !key_ids.iter().all(|id| segments.insert(Self::segment(id))) {
                    return Err(malformed(app_id, &self.app_var(app_id, "KEYS")));
                }
                key_ids
                    .into_iter()
                    .map(|key_id| self.load_key(app_id, key_id, created_at))
                    .collect::<Result<Vec<_>, _>>()?
            }
            (None, Some(pem)) => {
                let algorithm =
                    self.parse_algorithm(app_id, &self.app_var(app_id, "ALGORITHM"))?;
                vec![KeyPair::new(
                    DEFAULT_KEY_ID,
                    unescape_pem(&pem),
                    algorithm,
                    created_at,
                )]
            }
            (None, None) => Vec::new(),
        };

        let config = AppConfig {
            app_id: app_id.to_string(),
            enabled,
            keys,
            created_at,
        };
        config
            .validate()
            .map_err(|_| malformed(app_id, &self.app_var(app_id, "KEYS")))?;
        Ok(Some(config))
    }

    fn load_key(
        &self,
        app_id: &str,
        key_id: &str,
        app_created_at: DateTime<Utc>,
    ) -> Result<KeyPair, AuthError> {
        let public_key_var = self.key_var(app_id, key_id, "PUBLIC_KEY");
        let public_key = self
            .var(&public_key_var)
            .ok_or_else(|| malformed(app_id, &public_key_var))?;
        let algorithm = self.parse_algorithm(app_id, &self.key_var(app_id, key_id, "ALGORITHM"))?;

        let enabled_var = self.key_var(app_id, key_id, "ENABLED");
        let enabled = match self.var(&enabled_var) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| malformed(app_id, &enabled_var))?,
            None => true,
        };

        Ok(KeyPair {
            key_id: key_id.to_string(),
            public_key: unescape_pem(&public_key),
            algorithm,
            created_at: self
                .parse_time(app_id, &self.key_var(app_id, key_id, "CREATED_AT"))?
                .unwrap_or(app_created_at),
            expires_at: self.parse_time(app_id, &self.key_var(app_id, key_id, "EXPIRES_AT"))?,
            enabled,
        })
    }

    fn parse_algorithm(&self, app_id: &str, name: &str) -> Result<SignatureAlgorithm, AuthError> {
        match self.var(name) {
            Some(raw) => raw.parse().map_err(|_| malformed(app_id, name)),
            None => Ok(SignatureAlgorithm::Rs256),
        }
    }

    fn parse_time(&self, app_id: &str, name: &str) -> Result<Option<DateTime<Utc>>, AuthError> {
        self.var(name)
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| malformed(app_id, name))
            })
            .transpose()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_app_config(&self, app_id: &str) -> Result<Option<AppConfig>, StoreError> {
        if let Some(saved) = self.overlay.get(app_id) {
            return Ok(Some(saved.value().clone()));
        }
        Ok(self.load_app(app_id)?)
    }

    async fn save_app_config(&self, config: AppConfig) -> Result<(), StoreError> {
        self.overlay.insert(config.app_id.clone(), config);
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// PEM blocks are often provisioned on one line with literal `\n`.
fn unescape_pem(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

/// Names the offending variable, never its value.
fn malformed(app_id: &str, variable: &str) -> AuthError {
    AuthError::config(format!(
        "Malformed credential entry {} for app '{}'",
        variable, app_id
    ))
    .with_context("appId", app_id)
    .with_context("variable", variable)
}
