//! Canonical signing string.
//!
//! ```text
//! timestamp \n METHOD \n path \n app_id \n body
//! ```
//!
//! Shared by the verifier and [`RequestSigner`](super::signer::RequestSigner)
//! so both sides always produce the same bytes. The body is appended as raw
//! bytes; a missing body is the empty string.

/// Build the exact byte sequence that gets signed.
pub fn build_signing_string(
    timestamp: &str,
    method: &str,
    path: &str,
    app_id: &str,
    body: &[u8],
) -> Vec<u8> {
    let method = method.to_ascii_uppercase();
    let mut out = Vec::with_capacity(
        timestamp.len() + method.len() + path.len() + app_id.len() + body.len() + 4,
    );
    for part in [timestamp, method.as_str(), path, app_id] {
        out.extend_from_slice(part.as_bytes());
        out.push(b'\n');
    }
    out.extend_from_slice(body);
    out
}
