use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
};

use super::types::{ApiResponse, EchoResponse, HealthResponse};
use crate::api_auth::AuthState;
use crate::api_auth::models::VerifiedIdentity;

/// Health check. Listed in the skip paths, so it never sees an identity.
pub async fn health_check(
    State(state): State<Arc<AuthState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let response = HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        cached_apps: state.key_manager.cache_stats().size,
    };
    (StatusCode::OK, Json(ApiResponse::success(response)))
}

/// Return the identity established by the middleware.
pub async fn whoami(
    Extension(identity): Extension<VerifiedIdentity>,
) -> Json<ApiResponse<VerifiedIdentity>> {
    Json(ApiResponse::success(identity))
}

/// Return the identity together with the body the handler received.
pub async fn echo(
    Extension(identity): Extension<VerifiedIdentity>,
    body: Bytes,
) -> Json<ApiResponse<EchoResponse>> {
    Json(ApiResponse::success(EchoResponse {
        identity,
        body: String::from_utf8_lossy(&body).into_owned(),
        body_len: body.len(),
    }))
}
