// 🔑 Surrogate keys - deterministic natural key → dimension id

use sha2::{Digest, Sha256};

/// Width of a surrogate key in hex characters
pub const SURROGATE_KEY_LEN: usize = 12;

/// Derive the surrogate key for a natural key.
///
/// SHA-256 of the UTF-8 bytes, lowercase hex, truncated to 12 chars.
/// No seed and no counter, so the same input maps to the same id in every run.
/// The 48-bit space can collide; dimension cardinalities are far below that.
pub fn surrogate_key(natural_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(natural_key.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(SURROGATE_KEY_LEN);
    hex
}
