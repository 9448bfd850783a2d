//! Client-side request signing.
//!
//! The counterpart of the verification middleware: loads a PKCS#8 PEM
//! private key, signs the canonical string and produces the header set a
//! server running [`signature_auth_middleware`](super::middleware::signature_auth_middleware)
//! expects.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};
use ed25519_dalek::Signer;
use sha2::{Sha256, Sha512};

use super::canonical::build_signing_string;
use super::config::HeaderNames;
use super::error::AuthError;
use super::models::SignatureAlgorithm;

enum SigningMaterial {
    Rs256(rsa::pkcs1v15::SigningKey<Sha256>),
    Rs512(rsa::pkcs1v15::SigningKey<Sha512>),
    Es256(p256::ecdsa::SigningKey),
    Es512(p521::ecdsa::SigningKey),
    EdDsa(ed25519_dalek::SigningKey),
}

impl SigningMaterial {
    fn from_pkcs8_pem(algorithm: SignatureAlgorithm, pem: &str) -> Result<Self, AuthError> {
        let invalid = || {
            AuthError::validation(format!("Failed to load private key for {}", algorithm))
                .with_context("algorithm", algorithm.as_str())
        };

        match algorithm {
            SignatureAlgorithm::Rs256 | SignatureAlgorithm::Rs512 => {
                use rsa::pkcs1::DecodeRsaPrivateKey;
                use rsa::pkcs8::DecodePrivateKey;

                let key = rsa::RsaPrivateKey::from_pkcs8_pem(pem)
                    .or_else(|_| rsa::RsaPrivateKey::from_pkcs1_pem(pem))
                    .map_err(|_| invalid())?;
                Ok(if algorithm == SignatureAlgorithm::Rs512 {
                    Self::Rs512(rsa::pkcs1v15::SigningKey::new(key))
                } else {
                    Self::Rs256(rsa::pkcs1v15::SigningKey::new(key))
                })
            }
            SignatureAlgorithm::Es256 => {
                use p256::pkcs8::DecodePrivateKey;

                p256::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::Es256)
                    .map_err(|_| invalid())
            }
            SignatureAlgorithm::Es512 => {
                use p521::pkcs8::DecodePrivateKey;

                let secret = p521::SecretKey::from_pkcs8_pem(pem).map_err(|_| invalid())?;
                p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
                    .map(Self::Es512)
                    .map_err(|_| invalid())
            }
            SignatureAlgorithm::EdDsa => {
                use ed25519_dalek::pkcs8::DecodePrivateKey;

                ed25519_dalek::SigningKey::from_pkcs8_pem(pem)
                    .map(Self::EdDsa)
                    .map_err(|_| invalid())
            }
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        use rsa::signature::SignatureEncoding;

        match self {
            Self::Rs256(key) => key.sign(message).to_vec(),
            Self::Rs512(key) => key.sign(message).to_vec(),
            Self::Es256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            Self::Es512(key) => {
                let signature: p521::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            Self::EdDsa(key) => key.sign(message).to_bytes().to_vec(),
        }
    }
}

/// Current instant as RFC 3339 UTC with millisecond precision and `Z`.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Signs outgoing requests for one app/key.
pub struct RequestSigner {
    app_id: String,
    key_id: Option<String>,
    algorithm: SignatureAlgorithm,
    material: SigningMaterial,
    headers: HeaderNames,
}

impl RequestSigner {
    /// Load a PKCS#8 PEM private key (PKCS#1 also accepted for RSA).
    pub fn from_pkcs8_pem(
        app_id: impl Into<String>,
        algorithm: SignatureAlgorithm,
        private_key_pem: &str,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            app_id: app_id.into(),
            key_id: None,
            algorithm,
            material: SigningMaterial::from_pkcs8_pem(algorithm, private_key_pem)?,
            headers: HeaderNames::default(),
        })
    }

    /// Send `X-Key-Id` with every request.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_header_names(mut self, headers: HeaderNames) -> Self {
        self.headers = headers;
        self
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Sign arbitrary bytes, returning standard base64.
    pub fn sign(&self, message: &[u8]) -> String {
        STANDARD.encode(self.material.sign(message))
    }

    /// Build the signature headers for a request.
    ///
    /// `timestamp` defaults to [`current_timestamp`].
    pub fn signature_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
        timestamp: Option<&str>,
    ) -> Result<HeaderMap, AuthError> {
        let timestamp = timestamp.map_or_else(current_timestamp, str::to_string);
        let canonical =
            build_signing_string(&timestamp, method, path, &self.app_id, body.unwrap_or_default());
        let signature = self.sign(&canonical);

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, &self.headers.signature, &signature)?;
        insert_header(&mut headers, &self.headers.timestamp, &timestamp)?;
        insert_header(&mut headers, &self.headers.app_id, &self.app_id)?;
        if let Some(key_id) = &self.key_id {
            insert_header(&mut headers, &self.headers.key_id, key_id)?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), AuthError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| AuthError::validation(format!("Invalid header name: {}", name)))?;
    let value = HeaderValue::from_str(value).map_err(|_| {
        AuthError::validation(format!("Value for {} is not a valid header value", name))
    })?;
    headers.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::generate_pem_keypair;
    use crate::api_auth::signature::verify_base64;

    #[test]
    fn test_headers_contain_metadata() {
        let (private_pem, _) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
        let signer = RequestSigner::from_pkcs8_pem("shop", SignatureAlgorithm::EdDsa, &private_pem)
            .unwrap()
            .with_key_id("k1");

        let headers = signer
            .signature_headers("get", "/api/profile", None, Some("2024-01-01T00:00:00.000Z"))
            .unwrap();
        assert_eq!(headers["X-Timestamp"], "2024-01-01T00:00:00.000Z");
        assert_eq!(headers["X-App-Id"], "shop");
        assert_eq!(headers["X-Key-Id"], "k1");
        assert!(headers.contains_key("X-Signature"));
    }

    #[test]
    fn test_headers_verify_against_canonical_string() {
        let (private_pem, public_pem) = generate_pem_keypair(SignatureAlgorithm::Es256);
        let signer =
            RequestSigner::from_pkcs8_pem("shop", SignatureAlgorithm::Es256, &private_pem).unwrap();

        let body = br#"{"name":"John Doe"}"#;
        let headers = signer
            .signature_headers("POST", "/api/users", Some(body), None)
            .unwrap();
        let timestamp = headers["X-Timestamp"].to_str().unwrap();
        let signature = headers["X-Signature"].to_str().unwrap();

        let canonical = build_signing_string(timestamp, "POST", "/api/users", "shop", body);
        assert!(verify_base64(SignatureAlgorithm::Es256, &public_pem, &canonical, signature).is_ok());
        assert!(!headers.contains_key("X-Key-Id"));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = current_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_wrong_key_type_rejected() {
        let (private_pem, _) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
        let err = RequestSigner::from_pkcs8_pem("shop", SignatureAlgorithm::Es256, &private_pem)
            .err()
            .unwrap();
        assert_eq!(err.context["algorithm"], "ES256");
    }

    #[test]
    fn test_custom_header_names() {
        let (private_pem, _) = generate_pem_keypair(SignatureAlgorithm::EdDsa);
        let names = HeaderNames {
            signature: "Sig".to_string(),
            ..HeaderNames::default()
        };
        let headers = RequestSigner::from_pkcs8_pem("shop", SignatureAlgorithm::EdDsa, &private_pem)
            .unwrap()
            .with_header_names(names)
            .signature_headers("GET", "/", None, None)
            .unwrap();
        assert!(headers.contains_key("sig"));
        assert!(!headers.contains_key("x-signature"));
    }
}
