//! # Chain Digests
//!
//! SHA-256 digests over [`CanonicalBytes`] and the chain-hash construction
//! that links consecutive records of one business:
//!
//! ```text
//! current_hash = SHA-256( previous_hash (64 lowercase hex ASCII) || canonical invoice bytes )
//! ```
//!
//! The first record of every business links to [`ChainHash::genesis`], 64
//! ASCII `'0'` characters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A SHA-256 digest of canonical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    bytes: [u8; 32],
}

impl ContentDigest {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// SHA-256 digest of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    ContentDigest {
        bytes: hasher.finalize().into(),
    }
}

/// Link hash of a chain record: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainHash(String);

impl ChainHash {
    /// The previous-hash value of sequence 1.
    pub fn genesis() -> Self {
        Self("0".repeat(64))
    }

    /// Parse a stored hash.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidIdentifier`] unless the input is exactly 64
    /// lowercase hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        if s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::InvalidIdentifier {
                kind: "chain hash",
                value: s.to_string(),
                expected: "64 lowercase hex characters",
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_genesis(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// First `len` hex characters, upper-cased. Used as the QR verification fragment.
    pub fn fragment(&self, len: usize) -> String {
        self.0[..len.min(self.0.len())].to_ascii_uppercase()
    }
}

impl TryFrom<String> for ChainHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ChainHash> for String {
    fn from(h: ChainHash) -> Self {
        h.0
    }
}

impl std::fmt::Display for ChainHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the link hash of a record from its predecessor's hash and its
/// canonical invoice bytes.
pub fn chain_digest(previous: &ChainHash, canonical: &CanonicalBytes) -> ChainHash {
    let mut hasher = Sha256::new();
    hasher.update(previous.as_str().as_bytes());
    hasher.update(canonical.as_bytes());
    let bytes: [u8; 32] = hasher.finalize().into();
    ChainHash(to_hex(&bytes))
}
