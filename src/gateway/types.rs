use serde::Serialize;

use crate::api_auth::models::VerifiedIdentity;

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: i64,
    pub cached_apps: usize,
}

/// Echo of a verified request.
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub identity: VerifiedIdentity,
    /// Body as received, lossy UTF-8
    pub body: String,
    pub body_len: usize,
}
