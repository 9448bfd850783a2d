//! Signature authentication middleware for Axum.
//!
//! Gates every request that is not on the skip list. Verification flow,
//! stopping at the first failure:
//!
//! 1. Skip-path match → downstream, unauthenticated
//! 2. Signature, timestamp and app id headers present
//! 3. Timestamp parses and lies within the window
//! 4. Key resolved through the [`KeyManager`]
//! 5. Canonical string rebuilt (body buffered and re-attached)
//! 6. Signature verified with the key's algorithm
//! 7. [`VerifiedIdentity`] attached to request extensions

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, TimeDelta, Utc};

use super::{
    canonical::build_signing_string,
    config::{AuthConfig, HeaderNames},
    error::AuthError,
    models::{DEFAULT_KEY_ID, KeyPair, VerifiedIdentity},
    signature::verify_base64,
};
use crate::clock::Clock;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, Diagnostics};
use crate::key_manager::KeyManager;

/// Builds the rejection response from the error and the request parts.
pub type ErrorHook = Arc<dyn Fn(AuthError, &Parts) -> Response + Send + Sync>;

/// Authentication state shared across requests.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub key_manager: Arc<KeyManager>,
    on_error: Option<ErrorHook>,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
}

impl AuthState {
    /// Uses the key manager's clock and a `tracing` sink.
    pub fn new(config: AuthConfig, key_manager: Arc<KeyManager>) -> Self {
        Self {
            clock: key_manager.clock(),
            diagnostics: Diagnostics::tracing(config.debug),
            config: Arc::new(config),
            key_manager,
            on_error: None,
        }
    }

    /// Produce rejection responses with `hook` instead of the default.
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(AuthError, &Parts) -> Response + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Diagnostics::new(sink, self.config.debug);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn reject(&self, err: AuthError, parts: &Parts) -> Response {
        match &self.on_error {
            Some(hook) => hook(err, parts),
            None => err.into_response(),
        }
    }
}

/// Signature metadata read from request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders<'a> {
    pub signature: &'a str,
    pub timestamp: &'a str,
    pub app_id: &'a str,
    pub key_id: Option<&'a str>,
}

/// Axum middleware for signature authentication.
///
/// Mount with `axum::middleware::from_fn_with_state(Arc<AuthState>, signature_auth_middleware)`.
pub async fn signature_auth_middleware(
    State(state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Step 1: Skip list
    if state.config.should_skip(request.uri().path()) {
        state.diagnostics.emit(DiagnosticEvent::RequestSkipped {
            path: request.uri().path(),
        });
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    match authenticate(&state, &parts, body).await {
        Ok((identity, body)) => {
            state.diagnostics.emit(DiagnosticEvent::RequestVerified {
                path: parts.uri.path(),
                app_id: &identity.app_id,
                key_id: &identity.key_id,
            });
            // Step 7: Inject into request extensions
            parts.extensions.insert(identity);
            next.run(Request::from_parts(parts, Body::from(body))).await
        }
        Err((err, detail)) => {
            state.diagnostics.emit(DiagnosticEvent::RequestRejected {
                path: parts.uri.path(),
                code: err.code,
                detail,
            });
            state.reject(err, &parts)
        }
    }
}

/// Steps 2-6. On failure returns the caller-visible error plus an internal
/// detail string for diagnostics.
async fn authenticate(
    state: &AuthState,
    parts: &Parts,
    body: Body,
) -> Result<(VerifiedIdentity, Bytes), (AuthError, String)> {
    let config = &state.config;

    // Step 2: Presence
    let meta = extract_signature_headers(&parts.headers, &config.headers)
        .map_err(|e| with_detail(e, "missing signature metadata"))?;

    // Step 3: Time window
    let timestamp = validate_timestamp(meta.timestamp, state.clock.now(), config.time_window_seconds)
        .map_err(|e| with_detail(e, "timestamp rejected"))?;

    // Step 4: Key resolution
    let key_id = meta.key_id.unwrap_or(DEFAULT_KEY_ID);
    let key = state
        .key_manager
        .resolve_key(meta.app_id, Some(key_id))
        .await
        .map_err(|e| with_detail(e, "key resolution failed"))?
        .ok_or_else(|| with_detail(AuthError::app_not_found(meta.app_id), "unknown app"))?;

    // Step 5: Canonical string
    let body = axum::body::to_bytes(body, config.max_body_bytes)
        .await
        .map_err(|_| {
            let err = AuthError::validation("Request body too large or unreadable")
                .with_context("maxBodyBytes", config.max_body_bytes);
            with_detail(err, "body read failed")
        })?;
    let canonical = build_signing_string(
        meta.timestamp,
        parts.method.as_str(),
        parts.uri.path(),
        meta.app_id,
        &body,
    );

    // Step 6: Signature
    verify_request_signature(&key, &canonical, meta.signature).map_err(|detail| {
        let err = AuthError::authentication("Signature verification failed")
            .with_context("appId", meta.app_id)
            .with_context("keyId", key_id);
        (err, detail)
    })?;

    let identity = VerifiedIdentity {
        app_id: meta.app_id.to_string(),
        key_id: key.key_id,
        algorithm: key.algorithm,
        timestamp,
        verified: true,
    };
    Ok((identity, body))
}

fn with_detail(err: AuthError, detail: &str) -> (AuthError, String) {
    let detail = format!("{}: {}", detail, err.message);
    (err, detail)
}

/// Read signature metadata. Empty values count as missing.
pub fn extract_signature_headers<'a>(
    headers: &'a HeaderMap,
    names: &HeaderNames,
) -> Result<SignatureHeaders<'a>, AuthError> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let signature = read(&names.signature);
    let timestamp = read(&names.timestamp);
    let app_id = read(&names.app_id);

    match (signature, timestamp, app_id) {
        (Some(signature), Some(timestamp), Some(app_id)) => Ok(SignatureHeaders {
            signature,
            timestamp,
            app_id,
            key_id: read(&names.key_id),
        }),
        _ => {
            let missing: Vec<&str> = [
                (signature.is_none(), names.signature.as_str()),
                (timestamp.is_none(), names.timestamp.as_str()),
                (app_id.is_none(), names.app_id.as_str()),
            ]
            .into_iter()
            .filter_map(|(absent, name)| absent.then_some(name))
            .collect();
            Err(AuthError::validation(format!(
                "Missing required headers: {}",
                missing.join(", ")
            ))
            .with_context("missing", missing))
        }
    }
}

/// Parse an RFC 3339 timestamp and check `|now - ts| <= window`.
///
/// A timestamp exactly `window_seconds` away is accepted.
pub fn validate_timestamp(
    raw: &str,
    now: DateTime<Utc>,
    window_seconds: u64,
) -> Result<DateTime<Utc>, AuthError> {
    let timestamp = DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            AuthError::validation("Invalid timestamp format, expected ISO-8601")
                .with_context("timestamp", raw)
        })?;

    let window = i64::try_from(window_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    // full precision: a microsecond past the edge is outside
    if (now - timestamp).abs() > window {
        return Err(AuthError::authentication(format!(
            "Request timestamp must be within {}s of server time",
            window_seconds
        ))
        .with_context("timestamp", raw)
        .with_context("windowSeconds", window_seconds));
    }
    Ok(timestamp)
}

/// Verify `signature` (base64) over `canonical` with `key`.
///
/// The error is an internal reason string; callers turn every failure into
/// the same authentication error.
pub fn verify_request_signature(
    key: &KeyPair,
    canonical: &[u8],
    signature: &str,
) -> Result<(), String> {
    verify_base64(key.algorithm, &key.public_key, canonical, signature).map_err(|failure| {
        format!(
            "signature rejected ({}, key {}): {}",
            key.algorithm, key.key_id, failure
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_auth::error::ErrorKind;
    use crate::api_auth::models::SignatureAlgorithm;
    use crate::testutil::generate_pem_keypair;
    use crate::api_auth::signer::RequestSigner;
    use axum::http::HeaderValue;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_extract_all_headers() {
        let map = headers(&[
            ("x-signature", "c2ln"),
            ("x-timestamp", "2024-06-01T12:00:00Z"),
            ("x-app-id", "shop"),
            ("x-key-id", "k1"),
        ]);
        let meta = extract_signature_headers(&map, &HeaderNames::default()).unwrap();
        assert_eq!(meta.signature, "c2ln");
        assert_eq!(meta.app_id, "shop");
        assert_eq!(meta.key_id, Some("k1"));
    }

    #[test]
    fn test_extract_reports_missing() {
        let map = headers(&[("x-signature", "c2ln"), ("x-app-id", " ")]);
        let err = extract_signature_headers(&map, &HeaderNames::default()).unwrap_err();
        assert_eq!(err.code, ErrorKind::Validation);
        assert_eq!(
            err.context["missing"],
            serde_json::json!(["X-Timestamp", "X-App-Id"])
        );
    }

    #[test]
    fn test_key_id_optional() {
        let map = headers(&[
            ("x-signature", "c2ln"),
            ("x-timestamp", "2024-06-01T12:00:00Z"),
            ("x-app-id", "shop"),
        ]);
        let meta = extract_signature_headers(&map, &HeaderNames::default()).unwrap();
        assert_eq!(meta.key_id, None);
    }

    #[test]
    fn test_timestamp_window_boundary() {
        let window = 300;
        let exact = (t0() - Duration::seconds(300)).to_rfc3339();
        assert!(validate_timestamp(&exact, t0(), window).is_ok());

        let beyond = (t0() - Duration::seconds(300) - Duration::milliseconds(1)).to_rfc3339();
        let err = validate_timestamp(&beyond, t0(), window).unwrap_err();
        assert_eq!(err.code, ErrorKind::Authentication);

        let micro_over = "2024-06-01T11:54:59.999999Z";
        assert!(validate_timestamp(micro_over, t0(), window).is_err());
        let micro_ahead = "2024-06-01T12:05:00.000001Z";
        assert!(validate_timestamp(micro_ahead, t0(), window).is_err());

        // future clocks are bounded too
        let ahead = (t0() + Duration::seconds(301)).to_rfc3339();
        assert!(validate_timestamp(&ahead, t0(), window).is_err());
    }

    #[test]
    fn test_timestamp_with_offset() {
        let parsed = validate_timestamp("2024-06-01T14:00:00+02:00", t0(), 1).unwrap();
        assert_eq!(parsed, t0());
    }

    #[test]
    fn test_unparsable_timestamp_is_validation_error() {
        let err = validate_timestamp("1717243200", t0(), 300).unwrap_err();
        assert_eq!(err.code, ErrorKind::Validation);
    }

    #[test]
    fn test_verify_request_signature_reason_is_internal() {
        let (private_pem, public_pem) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
        let key = KeyPair::new("default", public_pem, SignatureAlgorithm::EdDsa, t0());
        let signer =
            RequestSigner::from_pkcs8_pem("shop", SignatureAlgorithm::EdDsa, &private_pem).unwrap();

        let canonical = build_signing_string("ts", "GET", "/x", "shop", b"");
        let signature = signer.sign(&canonical);
        assert!(verify_request_signature(&key, &canonical, &signature).is_ok());

        let tampered = build_signing_string("ts", "GET", "/y", "shop", b"");
        let reason = verify_request_signature(&key, &tampered, &signature).unwrap_err();
        assert!(reason.contains("EdDSA"));
        assert!(reason.contains("does not match"));
    }
}
