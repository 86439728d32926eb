//! Crypto primitives: SHA-256, HMAC-SHA256, constant-time comparison, and
//! random identifier generation.
//!
//! The protocol deliberately uses nothing beyond SHA-256 and HMAC-SHA256.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest as raw bytes.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// SHA-256 digest as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// The client→server answer MAC: `hex(HMAC_SHA256(key=session_token, message))`.
pub fn hmac_sha256_hex(message: &str, key: &str) -> String {
    hex::encode(hmac_sha256(key.as_bytes(), message.as_bytes()))
}

/// Constant-time string equality. Differing lengths compare unequal without
/// leaking where the mismatch is.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Opaque challenge identifier: `ch_` + 32 hex chars.
pub fn generate_challenge_id() -> String {
    format!("ch_{}", hex::encode(random_bytes(16)))
}

/// Per-challenge shared secret: `st_` + 48 hex chars.
///
/// Used as the HMAC key for answer submission; never re-sent after init.
pub fn generate_session_token() -> String {
    format!("st_{}", hex::encode(random_bytes(24)))
}
