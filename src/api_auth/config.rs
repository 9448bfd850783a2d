//! Middleware configuration.
//!
//! [`AuthConfigFile`] is the serde form read from YAML; [`AuthConfig`] is
//! the compiled form the middleware runs with (patterns already built).

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Header names carrying signature metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    pub signature: String,
    pub timestamp: String,
    pub app_id: String,
    pub key_id: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            signature: "X-Signature".to_string(),
            timestamp: "X-Timestamp".to_string(),
            app_id: "X-App-Id".to_string(),
            key_id: "X-Key-Id".to_string(),
        }
    }
}

/// A path that bypasses verification.
#[derive(Debug, Clone)]
pub enum SkipPath {
    /// Path must equal this string
    Exact(String),
    /// Path must match this regex
    Pattern(Regex),
}

impl SkipPath {
    pub fn exact(path: impl Into<String>) -> Self {
        Self::Exact(path.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == path,
            Self::Pattern(regex) => regex.is_match(path),
        }
    }
}

/// Serialized skip entry: `{exact: "/health"}` or `{pattern: "^/public/"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipPathEntry {
    Exact(String),
    Pattern(String),
}

/// Runtime middleware configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Max |now - timestamp| in seconds, both directions
    pub time_window_seconds: u64,
    pub debug: bool,
    pub skip_paths: Vec<SkipPath>,
    pub headers: HeaderNames,
    /// Bodies larger than this are rejected before verification
    pub max_body_bytes: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 300, // 5 minutes
            debug: false,
            skip_paths: Vec::new(),
            headers: HeaderNames::default(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl AuthConfig {
    /// Add a skip entry.
    pub fn skip(mut self, entry: SkipPath) -> Self {
        self.skip_paths.push(entry);
        self
    }

    /// True if `path` equals an exact entry or matches a pattern entry.
    pub fn should_skip(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|entry| entry.matches(path))
    }
}

/// YAML form of [`AuthConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfigFile {
    pub time_window_seconds: u64,
    pub debug: bool,
    pub skip_paths: Vec<SkipPathEntry>,
    pub headers: HeaderNames,
    pub max_body_bytes: usize,
}

impl Default for AuthConfigFile {
    fn default() -> Self {
        let defaults = AuthConfig::default();
        Self {
            time_window_seconds: defaults.time_window_seconds,
            debug: defaults.debug,
            skip_paths: Vec::new(),
            headers: defaults.headers,
            max_body_bytes: defaults.max_body_bytes,
        }
    }
}

impl TryFrom<AuthConfigFile> for AuthConfig {
    type Error = AuthError;

    fn try_from(file: AuthConfigFile) -> Result<Self, Self::Error> {
        let skip_paths = file
            .skip_paths
            .into_iter()
            .map(|entry| match entry {
                SkipPathEntry::Exact(path) => Ok(SkipPath::Exact(path)),
                SkipPathEntry::Pattern(pattern) => SkipPath::pattern(&pattern).map_err(|e| {
                    AuthError::config(format!("Invalid skip path pattern '{}': {}", pattern, e))
                        .with_context("pattern", pattern.as_str())
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            time_window_seconds: file.time_window_seconds,
            debug: file.debug,
            skip_paths,
            headers: file.headers,
            max_body_bytes: file.max_body_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_auth::error::ErrorKind;

    #[test]
    fn test_exact_and_pattern_skip() {
        let config = AuthConfig::default()
            .skip(SkipPath::exact("/health"))
            .skip(SkipPath::pattern(r"^/public/").unwrap());

        assert!(config.should_skip("/health"));
        assert!(!config.should_skip("/health/deep"));
        assert!(config.should_skip("/public/docs"));
        assert!(!config.should_skip("/api/public/docs"));
    }

    #[test]
    fn test_config_file_from_yaml() {
        let yaml = r#"
time_window_seconds: 60
skip_paths:
  - exact: /health
  - pattern: "^/static/.*\\.css$"
headers:
  signature: X-Sig
"#;
        let file: AuthConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.max_body_bytes, 1024 * 1024);
        assert_eq!(file.headers.timestamp, "X-Timestamp");

        let config = AuthConfig::try_from(file).unwrap();
        assert_eq!(config.time_window_seconds, 60);
        assert_eq!(config.headers.signature, "X-Sig");
        assert!(config.should_skip("/static/app.css"));
        assert!(!config.should_skip("/static/app.js"));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let file = AuthConfigFile {
            skip_paths: vec![SkipPathEntry::Pattern("([".to_string())],
            ..AuthConfigFile::default()
        };
        let err = AuthConfig::try_from(file).unwrap_err();
        assert_eq!(err.code, ErrorKind::Config);
    }
}
