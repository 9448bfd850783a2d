//! Signature Auth - request signing and verification for HTTP services
//!
//! # Modules
//!
//! - [`api_auth`] - Canonical string, signature verification, Axum middleware
//! - [`key_manager`] - App/key lookup with TTL cache
//! - [`store`] - Credential stores (environment, memory)
//! - [`clock`] - Time source
//! - [`diagnostics`] - Structured diagnostic events
//! - [`gateway`] - Demo HTTP server
//! - [`config`] / [`logging`] - Service configuration and tracing setup

pub mod api_auth;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod gateway;
pub mod key_manager;
pub mod logging;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Convenient re-exports at crate root
pub use api_auth::{
    AppConfig, AuthConfig, AuthError, AuthState, ErrorKind, KeyPair, RequestSigner,
    SignatureAlgorithm, VerifiedIdentity, signature_auth_middleware,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, TracingSink};
pub use key_manager::{KeyManager, KeyManagerConfig};
pub use store::{CredentialStore, EnvCredentialStore, MemoryCredentialStore, StorageKind};
