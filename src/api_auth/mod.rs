//! Signature-based request authentication.
//!
//! Clients sign `timestamp \n METHOD \n path \n app_id \n body` with a
//! private key; the server verifies with the registered public key.
//!
//! ## Components
//! - `canonical`: Canonical signing string
//! - `signature`: RS256 / RS512 / ES256 / ES512 / EdDSA verification
//! - `signer`: Client-side signing helper
//! - `error`: Authentication error types
//! - `models`: App, key and identity models
//! - `config`: Middleware configuration
//! - `middleware`: Axum verification middleware

pub mod canonical;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod signature;
pub mod signer;

// Re-export for convenience
pub use canonical::build_signing_string;
pub use config::{AuthConfig, AuthConfigFile, HeaderNames, SkipPath, SkipPathEntry};
pub use error::{AuthError, ErrorKind};
pub use middleware::{
    AuthState, ErrorHook, SignatureHeaders, extract_signature_headers, signature_auth_middleware,
    validate_timestamp, verify_request_signature,
};
pub use models::{
    AppConfig, AppConfigUpdate, DEFAULT_KEY_ID, KeyPair, SignatureAlgorithm, VerifiedIdentity,
};
pub use signature::{VerifyFailure, verify_base64};
pub use signer::{RequestSigner, current_timestamp};
