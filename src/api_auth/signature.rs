//! Signature verification for API authentication.
//!
//! Dispatches on [`SignatureAlgorithm`]. The server stores only public keys
//! (SPKI PEM), so private keys never leave the client.
//!
//! | Algorithm | Scheme | Signature bytes |
//! |-----------|--------|-----------------|
//! | RS256 / RS512 | RSASSA-PKCS1-v1_5, SHA-256 / SHA-512 | modulus-sized |
//! | ES256 | ECDSA P-256, SHA-256 | ASN.1 DER (fixed `r‖s` accepted) |
//! | ES512 | ECDSA P-521, SHA-512 | ASN.1 DER (fixed `r‖s` accepted) |
//! | EdDSA | Ed25519 | 64 bytes |

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ed25519_dalek::Verifier;
use sha2::{Sha256, Sha512};
use thiserror::Error;

use super::models::SignatureAlgorithm;

/// Why a signature did not verify.
///
/// Only for diagnostics: callers see a single authentication error whatever
/// the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("signature is not valid base64")]
    InvalidEncoding,

    #[error("public key could not be parsed for {0}")]
    InvalidPublicKey(SignatureAlgorithm),

    #[error("signature bytes are malformed for {0}")]
    MalformedSignature(SignatureAlgorithm),

    #[error("signature does not match")]
    Mismatch,
}

/// Decode a base64 signature (standard alphabet, URL-safe accepted).
pub fn decode_signature(encoded: &str) -> Result<Vec<u8>, VerifyFailure> {
    STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')))
        .map_err(|_| VerifyFailure::InvalidEncoding)
}

/// Verify a base64 `signature` over `message` with a PEM public key.
pub fn verify_base64(
    algorithm: SignatureAlgorithm,
    public_key_pem: &str,
    message: &[u8],
    signature: &str,
) -> Result<(), VerifyFailure> {
    let signature = decode_signature(signature)?;
    verify(algorithm, public_key_pem, message, &signature)
}

/// Verify raw `signature` bytes over `message` with a PEM public key.
pub fn verify(
    algorithm: SignatureAlgorithm,
    public_key_pem: &str,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerifyFailure> {
    match algorithm {
        SignatureAlgorithm::Rs256 | SignatureAlgorithm::Rs512 => {
            verify_rsa(algorithm, public_key_pem, message, signature)
        }
        SignatureAlgorithm::Es256 => verify_p256(public_key_pem, message, signature),
        SignatureAlgorithm::Es512 => verify_p521(public_key_pem, message, signature),
        SignatureAlgorithm::EdDsa => verify_ed25519(public_key_pem, message, signature),
    }
}

fn verify_rsa(
    algorithm: SignatureAlgorithm,
    public_key_pem: &str,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerifyFailure> {
    use rsa::RsaPublicKey;
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::pkcs8::DecodePublicKey;

    // SPKI first, bare PKCS#1 as a fallback
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
        .map_err(|_| VerifyFailure::InvalidPublicKey(algorithm))?;
    let signature =
        Signature::try_from(signature).map_err(|_| VerifyFailure::MalformedSignature(algorithm))?;

    let result = if algorithm == SignatureAlgorithm::Rs512 {
        VerifyingKey::<Sha512>::new(public_key).verify(message, &signature)
    } else {
        VerifyingKey::<Sha256>::new(public_key).verify(message, &signature)
    };
    result.map_err(|_| VerifyFailure::Mismatch)
}

fn verify_p256(public_key_pem: &str, message: &[u8], signature: &[u8]) -> Result<(), VerifyFailure> {
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::pkcs8::DecodePublicKey;

    let algorithm = SignatureAlgorithm::Es256;
    let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|_| VerifyFailure::InvalidPublicKey(algorithm))?;
    let signature = Signature::from_der(signature)
        .or_else(|_| Signature::from_slice(signature))
        .map_err(|_| VerifyFailure::MalformedSignature(algorithm))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| VerifyFailure::Mismatch)
}

fn verify_p521(public_key_pem: &str, message: &[u8], signature: &[u8]) -> Result<(), VerifyFailure> {
    use p521::ecdsa::{Signature, VerifyingKey};
    use p521::pkcs8::DecodePublicKey;

    let algorithm = SignatureAlgorithm::Es512;
    let public_key = p521::PublicKey::from_public_key_pem(public_key_pem)
        .map_err(|_| VerifyFailure::InvalidPublicKey(algorithm))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&public_key.to_sec1_bytes())
        .map_err(|_| VerifyFailure::InvalidPublicKey(algorithm))?;
    let signature = Signature::from_der(signature)
        .or_else(|_| Signature::from_slice(signature))
        .map_err(|_| VerifyFailure::MalformedSignature(algorithm))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| VerifyFailure::Mismatch)
}

fn verify_ed25519(
    public_key_pem: &str,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerifyFailure> {
    use ed25519_dalek::pkcs8::DecodePublicKey;
    use ed25519_dalek::{Signature, VerifyingKey};

    let algorithm = SignatureAlgorithm::EdDsa;
    let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|_| VerifyFailure::InvalidPublicKey(algorithm))?;

    // Signature must be exactly 64 bytes
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| VerifyFailure::MalformedSignature(algorithm))?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| VerifyFailure::Mismatch)
}
