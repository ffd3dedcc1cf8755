//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// URL-safe, unpadded base64 (cookie and query-string friendly)
pub fn to_base64_url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn from_base64_url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE_NO_PAD.decode(s)
}

/// Compute HMAC-SHA256 over `data`
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Verify an HMAC-SHA256 tag in constant time
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

/// Produce `"{payload}.{base64url(hmac(payload))}"`
pub fn sign(key: &[u8], payload: &str) -> String {
    let tag = hmac_sha256(key, payload.as_bytes());
    format!("{}.{}", payload, to_base64_url(&tag))
}

/// Inverse of [`sign`]: returns the payload if the tag checks out.
///
/// The payload itself must not contain `.` after its last segment; the tag
/// is taken from the final `.`-separated part.
pub fn verify_signed<'a>(key: &[u8], token: &'a str) -> Option<&'a str> {
    let (payload, tag_b64) = token.rsplit_once('.')?;
    let tag = from_base64_url(tag_b64).ok()?;
    verify_hmac_sha256(key, payload.as_bytes(), &tag).then_some(payload)
}
