//! Webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs the raw request body with the shared secret and sends the
//! result in `X-Hub-Signature-256` as `sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Parses a signature header (e.g. `sha256=abc123...`) into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex).
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of `payload` keyed with `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a signature header against the payload and secret.
///
/// The comparison is constant-time (delegated to the HMAC implementation).
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected_signature = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&expected_signature).is_ok()
}

/// Compares a URL token against the secret.
///
/// Both sides are hashed first so the comparison runs over equal-length
/// digests: timing depends on neither the mismatch position nor the length.
pub fn verify_token(provided: &[u8], secret: &[u8]) -> bool {
    let provided = Sha256::digest(provided);
    let secret = Sha256::digest(secret);
    provided.as_slice().ct_eq(secret.as_slice()).into()
}
