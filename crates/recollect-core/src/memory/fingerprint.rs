//! Content fingerprints
//!
//! SHA-256 over the trimmed content, hex encoded and truncated. The short
//! digest keeps the unique index compact; at very large store sizes the
//! 64-bit width is a collision risk that is accepted, not handled.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Compute the deduplication fingerprint of `content`
///
/// Leading and trailing whitespace never affects the result.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_HEX_LEN].to_string()
}
