//! Content hashing. One digest serves as cache key, change sentinel, and
//! chunk provenance, so it must be stable across platforms.

use sha2::{Digest, Sha256};

/// SHA-256 over raw bytes, lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

/// SHA-256 over a string's UTF-8 bytes.
pub fn hash_text(text: &str) -> String {
    hash_bytes(text.as_bytes())
}

/// Short stable identifier derived from key parts joined with `\x1f`.
/// 16 hex chars (64 bits) is plenty for per-index uniqueness.
pub fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    hex(&hasher.finalize())[..16].to_string()
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
