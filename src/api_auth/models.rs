//! Credential models and types.
//!
//! Defines the per-application configuration held by credential stores and
//! the identity record attached to verified requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Key id used when a request or lookup names none.
pub const DEFAULT_KEY_ID: &str = "default";

/// Signature algorithm enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    #[serde(rename = "RS256")]
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    #[serde(rename = "RS512")]
    Rs512,
    /// ECDSA on P-256 with SHA-256
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA on P-521 with SHA-512
    #[serde(rename = "ES512")]
    Es512,
    /// Ed25519
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl SignatureAlgorithm {
    /// Every supported algorithm, in advertised order.
    pub const ALL: [Self; 5] = [Self::Rs256, Self::Rs512, Self::Es256, Self::Es512, Self::EdDsa];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs512 => "RS512",
            Self::Es256 => "ES256",
            Self::Es512 => "ES512",
            Self::EdDsa => "EdDSA",
        }
    }

    /// Names of all supported algorithms.
    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.as_str()).collect()
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| {
                let supported = Self::supported_names();
                AuthError::validation(format!(
                    "Unsupported algorithm: {}. Supported: {}",
                    s,
                    supported.join(", ")
                ))
                .with_context("algorithm", s)
                .with_context("supported", supported)
            })
    }
}

fn default_enabled() -> bool {
    true
}

/// One registered public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    /// Unique within the owning app
    pub key_id: String,
    /// SPKI PEM public key
    pub public_key: String,
    pub algorithm: SignatureAlgorithm,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl KeyPair {
    pub fn new(
        key_id: impl Into<String>,
        public_key: impl Into<String>,
        algorithm: SignatureAlgorithm,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            public_key: public_key.into(),
            algorithm,
            created_at,
            expires_at: None,
            enabled: true,
        }
    }

    /// Set an expiry instant.
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if the key is past its expiry at `now`. No grace period.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// One registered application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub keys: Vec<KeyPair>,
    pub created_at: DateTime<Utc>,
}

impl AppConfig {
    /// Create an enabled app with no keys.
    pub fn new(app_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            app_id: app_id.into(),
            enabled: true,
            keys: Vec::new(),
            created_at,
        }
    }

    /// Append a key.
    pub fn with_key(mut self, key: KeyPair) -> Self {
        self.keys.push(key);
        self
    }

    /// Find a key by id.
    pub fn key(&self, key_id: &str) -> Option<&KeyPair> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }

    /// All key ids, in registration order.
    pub fn key_ids(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.key_id.clone()).collect()
    }

    /// Reject configs whose key ids are not unique.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.app_id.trim().is_empty() {
            return Err(AuthError::validation("appId must not be empty"));
        }
        for (i, key) in self.keys.iter().enumerate() {
            if self.keys[..i].iter().any(|k| k.key_id == key.key_id) {
                return Err(AuthError::validation(format!(
                    "Duplicate keyId '{}' in app '{}'",
                    key.key_id, self.app_id
                ))
                .with_context("appId", self.app_id.as_str())
                .with_context("keyId", key.key_id.as_str()));
            }
        }
        Ok(())
    }
}

/// Partial update for [`AppConfig`].
///
/// `app_id` and `created_at` are accepted so that callers can pass through
/// whole documents, but they are never applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfigUpdate {
    pub app_id: Option<String>,
    pub enabled: Option<bool>,
    pub keys: Option<Vec<KeyPair>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AppConfigUpdate {
    /// Toggle only the enabled flag.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Replace only the key collection.
    pub fn keys(keys: Vec<KeyPair>) -> Self {
        Self {
            keys: Some(keys),
            ..Self::default()
        }
    }

    /// Merge over `existing`, keeping its `app_id` and `created_at`.
    pub fn apply_to(self, existing: &AppConfig) -> AppConfig {
        AppConfig {
            app_id: existing.app_id.clone(),
            enabled: self.enabled.unwrap_or(existing.enabled),
            keys: self.keys.unwrap_or_else(|| existing.keys.clone()),
            created_at: existing.created_at,
        }
    }
}

/// Identity attached to request extensions after successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub app_id: String,
    pub key_id: String,
    pub algorithm: SignatureAlgorithm,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
}
