#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use signature_auth::api_auth::{AppConfig, KeyPair, RequestSigner, SignatureAlgorithm};
use signature_auth::clock::ManualClock;
use signature_auth::key_manager::{KeyManager, KeyManagerConfig};
use signature_auth::store::{CredentialStore, MemoryCredentialStore, StorageKind, StoreError};

pub use signature_auth::testutil::generate_pem_keypair;

/// Fixed "now" for every flow test.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Wire format used by clients.
pub fn wire_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A registered key plus a signer for it.
pub struct Client {
    pub signer: RequestSigner,
    pub key: KeyPair,
}

pub fn client(app_id: &str, key_id: &str, algorithm: SignatureAlgorithm) -> Client {
    let (private_pem, public_pem) = generate_pem_keypair(algorithm);
    let signer = RequestSigner::from_pkcs8_pem(app_id, algorithm, &private_pem)
        .unwrap()
        .with_key_id(key_id);
    Client {
        signer,
        key: KeyPair::new(key_id, public_pem, algorithm, t0()),
    }
}

pub fn app(app_id: &str, keys: Vec<KeyPair>) -> AppConfig {
    keys.into_iter()
        .fold(AppConfig::new(app_id, t0()), AppConfig::with_key)
}

/// Memory store that counts reads made through it.
pub struct CountingStore {
    inner: Arc<MemoryCredentialStore>,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get_app_config(&self, app_id: &str) -> Result<Option<AppConfig>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_app_config(app_id).await
    }

    async fn save_app_config(&self, config: AppConfig) -> Result<(), StoreError> {
        self.inner.save_app_config(config).await
    }
}

/// Memory store + key manager + manual clock, all pointed at `t0()`.
///
/// The key manager reads through `counter`; writes to `store` bypass it.
pub struct Fixture {
    pub store: Arc<MemoryCredentialStore>,
    pub counter: Arc<CountingStore>,
    pub clock: Arc<ManualClock>,
    pub key_manager: Arc<KeyManager>,
}

impl Fixture {
    pub fn new(apps: Vec<AppConfig>) -> Self {
        let store = Arc::new(MemoryCredentialStore::with_apps(apps));
        let counter = Arc::new(CountingStore {
            inner: store.clone(),
            reads: AtomicUsize::new(0),
        });
        let clock = Arc::new(ManualClock::new(t0()));
        let config = KeyManagerConfig {
            storage: StorageKind::Memory,
            ..KeyManagerConfig::default()
        };
        let key_manager = Arc::new(
            KeyManager::with_store(config, counter.clone() as Arc<dyn CredentialStore>)
                .with_clock(clock.clone()),
        );
        Self {
            store,
            counter,
            clock,
            key_manager,
        }
    }

    /// Store reads the key manager has made so far.
    pub fn store_reads(&self) -> usize {
        self.counter.reads()
    }
}

/// Signed request at `timestamp`.
pub fn signed_request(
    signer: &RequestSigner,
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: &str,
) -> Request<Body> {
    let headers = signer
        .signature_headers(method, path, Some(body), Some(timestamp))
        .unwrap();
    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::from(body.to_vec()))
        .unwrap();
    request.headers_mut().extend(headers);
    request
}

/// Send through the router, returning status and JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
