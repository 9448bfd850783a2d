//! Key material for tests.
//!
//! Unit tests get this module through `cfg(test)`; integration tests enable
//! the `testutil` feature, which the crate's own dev-dependency entry does:
//!
//! ```toml
//! [dev-dependencies]
//! signature_auth = { path = ".", features = ["testutil"] }
//! ```

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::api_auth::SignatureAlgorithm;

// RSA generation is slow in debug builds; share one key per test binary.
static RSA_KEYPAIR: Lazy<(String, String)> = Lazy::new(|| {
    let private = rsa::RsaPrivateKey::new(&mut OsRng, 1024).expect("rsa keygen");
    let public = rsa::RsaPublicKey::from(&private);
    (
        private.to_pkcs8_pem(LineEnding::LF).expect("rsa pkcs8").to_string(),
        public.to_public_key_pem(LineEnding::LF).expect("rsa spki"),
    )
});

/// Fresh key pair for `algorithm` as (private PKCS#8 PEM, public SPKI PEM).
///
/// RS256 and RS512 share a single cached RSA key.
pub fn generate_pem_keypair(algorithm: SignatureAlgorithm) -> (String, String) {
    match algorithm {
        SignatureAlgorithm::Rs256 | SignatureAlgorithm::Rs512 => RSA_KEYPAIR.clone(),
        SignatureAlgorithm::Es256 => {
            let secret = p256::SecretKey::random(&mut OsRng);
            (
                secret.to_pkcs8_pem(LineEnding::LF).expect("p256 pkcs8").to_string(),
                secret.public_key().to_public_key_pem(LineEnding::LF).expect("p256 spki"),
            )
        }
        SignatureAlgorithm::Es512 => {
            let secret = p521::SecretKey::random(&mut OsRng);
            (
                secret.to_pkcs8_pem(LineEnding::LF).expect("p521 pkcs8").to_string(),
                secret.public_key().to_public_key_pem(LineEnding::LF).expect("p521 spki"),
            )
        }
        SignatureAlgorithm::EdDsa => {
            let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
            (
                signing.to_pkcs8_pem(LineEnding::LF).expect("ed25519 pkcs8").to_string(),
                signing
                    .verifying_key()
                    .to_public_key_pem(LineEnding::LF)
                    .expect("ed25519 spki"),
            )
        }
    }
}
