//! Authentication error types.
//!
//! Every rejection raised by the key manager, the credential stores or the
//! verification middleware is an [`AuthError`]: a coarse [`ErrorKind`], a
//! human readable message, the HTTP status it maps to and a structured
//! context map for diagnosis. Context never holds key material.

use std::collections::BTreeMap;
use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error kinds surfaced to callers and to the `on_error` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Malformed input, unsupported algorithm or missing field (caller mistake)
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Unknown or disabled application
    #[serde(rename = "APP_NOT_FOUND")]
    AppNotFound,
    /// Missing, disabled or expired key. One kind for all three.
    #[serde(rename = "KEY_NOT_FOUND")]
    KeyNotFound,
    /// Timestamp outside the window or signature mismatch
    #[serde(rename = "AUTHENTICATION_ERROR")]
    Authentication,
    /// Unexpected credential store failure
    #[serde(rename = "STORAGE_ERROR")]
    Storage,
    /// Malformed provisioning data (environment namespace, config file)
    #[serde(rename = "CONFIG_ERROR")]
    Config,
}

impl ErrorKind {
    /// Get error name string.
    pub fn name(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::AppNotFound => "APP_NOT_FOUND",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Config => "CONFIG_ERROR",
        }
    }

    /// Default HTTP status for this kind.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::AppNotFound | Self::KeyNotFound | Self::Authentication => {
                StatusCode::UNAUTHORIZED
            }
            Self::Storage | Self::Config => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured authentication error.
///
/// Serializes as `{code, message, statusCode, context}`.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct AuthError {
    pub code: ErrorKind,
    pub message: String,
    pub status_code: u16,
    pub context: BTreeMap<String, Value>,
}

impl AuthError {
    /// Create a new error with the kind's default status.
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: code.http_status().as_u16(),
            context: BTreeMap::new(),
        }
    }

    /// Override the HTTP status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = status.as_u16();
        self
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// No application registered under `app_id`.
    pub fn app_not_found(app_id: &str) -> Self {
        Self::new(ErrorKind::AppNotFound, format!("App not found: {}", app_id))
            .with_context("appId", app_id)
    }

    /// Application exists but is disabled. Same kind, 403.
    pub fn app_disabled(app_id: &str) -> Self {
        Self::new(ErrorKind::AppNotFound, format!("App is disabled: {}", app_id))
            .with_status(StatusCode::FORBIDDEN)
            .with_context("appId", app_id)
    }

    /// Key missing, disabled or expired.
    ///
    /// The message is identical for all three so callers cannot enumerate
    /// key ids; `reason` only lands in the context.
    pub fn key_not_found(app_id: &str, key_id: &str, reason: &'static str) -> Self {
        Self::new(
            ErrorKind::KeyNotFound,
            format!("Key not found or unavailable: {}/{}", app_id, key_id),
        )
        .with_context("appId", app_id)
        .with_context("keyId", key_id)
        .with_context("reason", reason)
    }

    /// Get the HTTP status.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// JSON response body for auth errors.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = AuthErrorResponse {
            code: self.code.name(),
            message: self.message,
        };
        (status, Json(body)).into_response()
    }
}
