//! Canonical serialization and hashing for deterministic run provenance.
//!
//! Two hash families live here:
//!
//! - **Artifact fingerprints** (xxh64 over canonical JSON): cheap, used to
//!   assert that the same drafts + the same configuration produce the same
//!   alignment, column for column.
//! - **Content hashes** (SHA-256 over canonicalized draft text): stable
//!   identifiers for draft text that external stores can use to detect
//!   drift between what was aligned and what is on disk.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap allowed: use ordered collections in hashed data

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Produces deterministic output for the same input, suitable for
/// fingerprint computation and replay comparison.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute the canonical xxh64 fingerprint of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute the canonical fingerprint and return it as a hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Normalize draft text to canonical form for content hashing.
///
/// Transformations applied:
/// 1. Normalize newlines: CRLF and isolated CR become LF
/// 2. Trim leading and trailing whitespace
///
/// Inner whitespace is left untouched: irregular spacing inside a deed
/// transcription is meaningful to the format reconstructor, so only the
/// encoding artifacts at the edges are canonicalized away.
pub fn normalize_draft_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized.trim().to_string()
}

/// Compute the SHA-256 content hash of canonicalized draft text.
///
/// Returned as a 64-character lowercase hex string. Two transcriptions
/// that differ only in newline style or edge whitespace hash identically.
pub fn compute_content_hash(text: &str) -> String {
    let canonical = normalize_draft_text(text);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_fingerprint_determinism() {
        let s = TestStruct {
            name: "block_1".to_string(),
            value: 42,
        };

        let h1 = canonical_hash(&s);
        let h2 = canonical_hash(&s);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_fingerprint_hex_width() {
        let s = TestStruct {
            name: "block_1".to_string(),
            value: 42,
        };
        assert_eq!(canonical_hash_hex(&s).len(), 16);
    }

    #[test]
    fn test_normalize_draft_text_newlines() {
        assert_eq!(normalize_draft_text("Thence\r\nSouth"), "Thence\nSouth");
        assert_eq!(normalize_draft_text("Thence\rSouth"), "Thence\nSouth");
    }

    #[test]
    fn test_normalize_draft_text_preserves_inner_spacing() {
        // Double spaces inside the text survive; only the edges are trimmed.
        assert_eq!(
            normalize_draft_text("  N. 4°00' W.,  1638 feet  "),
            "N. 4°00' W.,  1638 feet"
        );
    }

    #[test]
    fn test_content_hash_newline_invariance() {
        let lf = compute_content_hash("Beginning at a point\nthence South");
        let crlf = compute_content_hash("Beginning at a point\r\nthence South");
        assert_eq!(lf, crlf);
    }

    #[test]
    fn test_content_hash_differs_on_content() {
        assert_ne!(
            compute_content_hash("a widow"),
            compute_content_hash("a window")
        );
    }

    #[test]
    fn test_content_hash_format() {
        let hash = compute_content_hash("test");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
