//! Shared-secret request signing
//!
//! A token is `base64url(HMAC-SHA256(key, basename))[..12 bytes]`. Only the
//! final path component is signed, so one asset mounted under several
//! directories validates with a single token. Signing is disabled when no
//! key is configured.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::path::basename;

type HmacSha256 = Hmac<Sha256>;

/// Number of MAC bytes kept in a token (16 base64 characters)
pub const TOKEN_BYTES: usize = 12;

#[derive(Clone, Default)]
pub struct Signer {
    key: Option<Vec<u8>>,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Signer {
    /// Empty keys disable signing
    pub fn new(key: Option<Vec<u8>>) -> Self {
        Self {
            key: key.filter(|key| !key.is_empty()),
        }
    }

    pub fn with_key(key: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(key.into()))
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Token for the final component of `path`, `None` when signing is off
    pub fn sign(&self, path: &str) -> Option<String> {
        let key = self.key.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(basename(path).as_bytes());
        let digest = mac.finalize().into_bytes();
        Some(URL_SAFE_NO_PAD.encode(&digest[..TOKEN_BYTES]))
    }

    /// Always true when signing is off; otherwise the supplied token must
    /// equal [`sign`](Self::sign) for the same basename
    pub fn verify(&self, path: &str, supplied: Option<&str>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        match (self.sign(path), supplied) {
            (Some(expected), Some(supplied)) => constant_time_compare(&expected, supplied),
            _ => false,
        }
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
