//! HMAC-SHA256 signature verification.
//!
//! The platform signs every delivery with the app's client secret and sends
//! the base64 digest in `X-Shopify-Hmac-Sha256`. The digest is computed over
//! the raw body bytes, so verification must happen before any JSON parsing.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing X-Shopify-Hmac-Sha256 header")]
    MissingSignature,

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("invalid HMAC secret")]
    InvalidSecret,
}

/// Base64-encoded HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, VerifyError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| VerifyError::InvalidSecret)?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check `signature` (base64) against the body in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), VerifyError> {
    if signature.is_empty() {
        return Err(VerifyError::MissingSignature);
    }

    let provided = STANDARD
        .decode(signature)
        .map_err(|_| VerifyError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| VerifyError::InvalidSecret)?;
    mac.update(body);

    mac.verify_slice(&provided)
        .map_err(|_| VerifyError::InvalidSignature)
}
