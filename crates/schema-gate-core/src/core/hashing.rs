// crates/schema-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Schema Gate Canonical Hashing
// Description: RFC 8785 JSON canonicalization and digest helpers.
// Purpose: Provide deterministic hashes for table leaves and tree nodes.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Schema Gate hashes canonical JSON using RFC 8785 (JCS) so that a digest
//! computed by one build is reproducible by any conformant implementation.
//! Tree inputs are domain separated: leaves, interior nodes, and the empty
//! tree each carry a distinct one-byte prefix before hashing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Digest algorithms a tree or baseline may be computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Algorithm used when configuration does not pick one.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Domain prefix for leaf digests.
pub const LEAF_PREFIX: u8 = 0x00;
/// Domain prefix for interior node digests.
pub const NODE_PREFIX: u8 = 0x01;
/// Domain prefix for the empty-tree digest.
pub const EMPTY_PREFIX: u8 = 0x02;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// A digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Producing algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Wraps raw digest bytes, hex-encoding them.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }

    /// Decodes the hex value back into raw digest bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidDigest`] when the value is not valid hex.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HashError> {
        hex_decode(&self.value)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while canonicalizing or decoding digests.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value could not be rendered as canonical JSON.
    #[error("canonical json encoding failed: {0}")]
    Canonicalization(String),
    /// Digest value is not well-formed hex.
    #[error("invalid digest encoding: {0}")]
    InvalidDigest(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Serializes `value` into RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Digests a single byte slice.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    hash_parts(algorithm, &[bytes])
}

/// Digests the concatenation of `parts` without materializing it.
pub(crate) fn hash_parts(algorithm: HashAlgorithm, parts: &[&[u8]]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = parts
                .iter()
                .fold(Sha256::new(), |hasher, part| hasher.chain_update(part))
                .finalize();
            HashDigest::new(algorithm, &digest)
        }
    }
}

/// Digests `prefix ‖ JCS(value)`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_prefixed_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    prefix: u8,
    value: &T,
) -> Result<HashDigest, HashError> {
    let body = canonical_json_bytes(value)?;
    Ok(hash_parts(algorithm, &[&[prefix], &body]))
}

/// Combines two child digests as `NODE_PREFIX ‖ left ‖ right`.
///
/// # Errors
///
/// Returns [`HashError::InvalidDigest`] when a child digest is not valid hex.
pub fn hash_node(
    algorithm: HashAlgorithm,
    left: &HashDigest,
    right: &HashDigest,
) -> Result<HashDigest, HashError> {
    let (left, right) = (left.to_bytes()?, right.to_bytes()?);
    Ok(hash_parts(algorithm, &[&[NODE_PREFIX], &left, &right]))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Renders digest bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .filter_map(|nibble| char::from_digit(u32::from(nibble), 16))
        .collect()
}

/// Parses hex of either case back into bytes.
fn hex_decode(value: &str) -> Result<Vec<u8>, HashError> {
    let nibbles = value
        .chars()
        .map(|ch| {
            ch.to_digit(16)
                .and_then(|digit| u8::try_from(digit).ok())
                .ok_or_else(|| HashError::InvalidDigest(format!("invalid hex character {ch}")))
        })
        .collect::<Result<Vec<u8>, HashError>>()?;
    let pairs = nibbles.chunks_exact(2);
    if !pairs.remainder().is_empty() {
        return Err(HashError::InvalidDigest("odd hex length".to_string()));
    }
    Ok(pairs.map(|pair| pair.iter().fold(0_u8, |acc, nibble| (acc << 4) | nibble)).collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

    use super::*;

    #[test]
    fn hex_encoding_is_lowercase_and_reversible() {
        let bytes = [0x00, 0x7f, 0x80, 0xff, 0x12];
        let encoded = hex_encode(&bytes);
        assert_eq!(encoded, "007f80ff12");
        assert_eq!(hex_decode(&encoded).unwrap(), bytes.to_vec());
    }

    #[test]
    fn hex_decode_rejects_bad_input() {
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
        assert!(hex_decode("+1").is_err());
        assert_eq!(hex_decode("ABcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn node_hash_is_order_sensitive() {
        let left = hash_bytes(DEFAULT_HASH_ALGORITHM, b"left");
        let right = hash_bytes(DEFAULT_HASH_ALGORITHM, b"right");
        let forward = hash_node(DEFAULT_HASH_ALGORITHM, &left, &right).unwrap();
        let reverse = hash_node(DEFAULT_HASH_ALGORITHM, &right, &left).unwrap();
        assert_ne!(forward, reverse);
    }

    #[test]
    fn streamed_parts_match_the_concatenated_input() {
        let joined = hash_bytes(DEFAULT_HASH_ALGORITHM, b"\x01abc");
        let parts = hash_parts(DEFAULT_HASH_ALGORITHM, &[&[NODE_PREFIX], b"ab", b"c"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn digests_key_hash_sets() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(hash_bytes(DEFAULT_HASH_ALGORITHM, b"a")));
        assert!(!seen.insert(hash_bytes(DEFAULT_HASH_ALGORITHM, b"a")));
        assert!(seen.insert(hash_bytes(DEFAULT_HASH_ALGORITHM, b"b")));
    }

    #[test]
    fn prefix_separates_domains() {
        let leaf = hash_prefixed_json(DEFAULT_HASH_ALGORITHM, LEAF_PREFIX, "x").unwrap();
        let empty = hash_prefixed_json(DEFAULT_HASH_ALGORITHM, EMPTY_PREFIX, "x").unwrap();
        assert_ne!(leaf, empty);
    }
}
