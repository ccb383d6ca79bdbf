//! Content fingerprints using blake3.
//!
//! A fingerprint is the first [`FINGERPRINT_LEN`] hex chars of a blake3
//! digest. Fixed width, lowercase hex, so it can be recognised in request
//! paths (`bundle/core-0123abcd….js`).
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let fp = hash::Fingerprinter::new().str("core/a.js").i64(mtime).finish();
//! // -> "a1b2c3d4…" (32 chars)
//! ```

/// Width of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Incremental fingerprint over a sequence of fields.
///
/// Each field is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
#[derive(Default)]
pub struct Fingerprinter {
    hasher: blake3::Hasher,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn finish(&self) -> String {
        truncate(self.hasher.finalize())
    }
}

fn truncate(hash: blake3::Hash) -> String {
    let mut hex = hex::encode(hash.as_bytes());
    hex.truncate(FINGERPRINT_LEN);
    hex
}
