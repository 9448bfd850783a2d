//! Apps provisioned through the environment namespace, verified end to end.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;

use common::{generate_pem_keypair, send, signed_request, t0, wire_timestamp};
use signature_auth::api_auth::{AuthConfig, AuthState, ErrorKind, RequestSigner, SignatureAlgorithm};
use signature_auth::clock::ManualClock;
use signature_auth::gateway::build_router;
use signature_auth::key_manager::{KeyManager, KeyManagerConfig};
use signature_auth::store::{DEFAULT_ENV_PREFIX, EnvCredentialStore};

/// Env values carry PEM newlines as literal `\n`.
fn escaped(pem: &str) -> String {
    pem.trim_end().replace('\n', "\\n")
}

fn key_manager(vars: Vec<(String, String)>) -> Arc<KeyManager> {
    let store = Arc::new(EnvCredentialStore::from_vars(DEFAULT_ENV_PREFIX, vars));
    Arc::new(
        KeyManager::with_store(KeyManagerConfig::default(), store)
            .with_clock(Arc::new(ManualClock::new(t0()))),
    )
}

#[tokio::test]
async fn test_shorthand_default_key() {
    let (private_pem, public_pem) = generate_pem_keypair(SignatureAlgorithm::Es256);
    let km = key_manager(vec![
        (
            "SIGNATURE_AUTH_APP_MOBILE_APP_ID".to_string(),
            "mobile-app".to_string(),
        ),
        (
            "SIGNATURE_AUTH_APP_MOBILE_APP_PUBLIC_KEY".to_string(),
            escaped(&public_pem),
        ),
        (
            "SIGNATURE_AUTH_APP_MOBILE_APP_ALGORITHM".to_string(),
            "ES256".to_string(),
        ),
    ]);
    let router = build_router(Arc::new(AuthState::new(AuthConfig::default(), km)));

    let signer =
        RequestSigner::from_pkcs8_pem("mobile-app", SignatureAlgorithm::Es256, &private_pem)
            .unwrap();
    let request = signed_request(&signer, "GET", "/api/v1/whoami", b"", &wire_timestamp(t0()));
    let (status, json) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["appId"], "mobile-app");
    assert_eq!(json["data"]["keyId"], "default");
}

#[tokio::test]
async fn test_key_list_selects_named_key() {
    let (private_pem, public_pem) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
    let km = key_manager(vec![
        ("SIGNATURE_AUTH_APP_PARTNER_ENABLED".to_string(), "true".to_string()),
        ("SIGNATURE_AUTH_APP_PARTNER_KEYS".to_string(), "primary,backup".to_string()),
        (
            "SIGNATURE_AUTH_APP_PARTNER_KEY_PRIMARY_PUBLIC_KEY".to_string(),
            escaped(&public_pem),
        ),
        (
            "SIGNATURE_AUTH_APP_PARTNER_KEY_PRIMARY_ALGORITHM".to_string(),
            "EdDSA".to_string(),
        ),
        (
            "SIGNATURE_AUTH_APP_PARTNER_KEY_BACKUP_PUBLIC_KEY".to_string(),
            escaped(&public_pem),
        ),
        (
            "SIGNATURE_AUTH_APP_PARTNER_KEY_BACKUP_ALGORITHM".to_string(),
            "EdDSA".to_string(),
        ),
        (
            "SIGNATURE_AUTH_APP_PARTNER_KEY_BACKUP_ENABLED".to_string(),
            "false".to_string(),
        ),
    ]);

    let key = km.resolve_key("partner", Some("primary")).await.unwrap().unwrap();
    assert_eq!(key.algorithm, SignatureAlgorithm::EdDsa);
    assert!(key.public_key.contains('\n'));

    let err = km.resolve_key("partner", Some("backup")).await.unwrap_err();
    assert_eq!(err.code, ErrorKind::KeyNotFound);

    let router = build_router(Arc::new(AuthState::new(AuthConfig::default(), km)));
    let signer = RequestSigner::from_pkcs8_pem("partner", SignatureAlgorithm::EdDsa, &private_pem)
        .unwrap()
        .with_key_id("primary");
    let request = signed_request(&signer, "POST", "/api/v1/echo", b"ping", &wire_timestamp(t0()));
    let (status, json) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["body"], "ping");
}

#[tokio::test]
async fn test_malformed_entry_is_config_error() {
    let km = key_manager(vec![
        ("SIGNATURE_AUTH_APP_BROKEN_PUBLIC_KEY".to_string(), "pem".to_string()),
        ("SIGNATURE_AUTH_APP_BROKEN_ALGORITHM".to_string(), "HS256".to_string()),
    ]);

    let err = km.get_app_config("broken").await.unwrap_err();
    assert_eq!(err.code, ErrorKind::Config);
    // never echo the value back
    assert!(!err.to_string().contains("pem"));
    assert!(!km.validate_app("broken").await);
}

#[tokio::test]
async fn test_aliases_resolve_to_nothing_and_are_not_cached() {
    let (_, public_pem) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
    let km = key_manager(vec![
        ("SIGNATURE_AUTH_APP_MY_APP_ID".to_string(), "my-app".to_string()),
        ("SIGNATURE_AUTH_APP_MY_APP_PUBLIC_KEY".to_string(), escaped(&public_pem)),
        ("SIGNATURE_AUTH_APP_MY_APP_ALGORITHM".to_string(), "EdDSA".to_string()),
    ]);

    assert!(km.get_public_key("my-app", None).await.unwrap().is_some());
    for alias in ["MY_APP", "my_app", "My.App", "mY app", "my app", "MY-APP"] {
        assert_eq!(km.get_public_key(alias, None).await.unwrap(), None, "{}", alias);
        assert!(!km.validate_app(alias).await);
    }
    assert_eq!(km.cache_stats().size, 1);
}
