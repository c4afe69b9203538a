//! Wire encoding for binary values.
//!
//! One variant only: URL-safe alphabet, no padding. Keys, envelopes and
//! stored key blobs all go through these two functions so the outbound and
//! inbound paths cannot drift apart.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::CryptoError;

pub fn to_b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn from_b64(s: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(URL_SAFE_NO_PAD.decode(s.trim())?)
}
