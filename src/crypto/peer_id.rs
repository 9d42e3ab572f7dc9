//! Self-certifying peer identifiers and their tie-break order

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{CryptoError, CryptoResult};
use super::hash::{Hash, HASH_SIZE};
use super::keys::PublicKey;

/// Identifier of a peer: the BLAKE3 hash of its Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; HASH_SIZE]);

impl PeerId {
    /// Derive the identifier certified by `public_key`
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        PeerId(Hash::hash(public_key.as_bytes()))
    }

    /// Wrap an already-derived identifier
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        bytes
            .try_into()
            .map(PeerId)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: HASH_SIZE,
                actual: bytes.len(),
            })
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PeerId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Order two peers for the simultaneous-connect tie-break
///
/// Equal identifiers compare `Equal`. Otherwise the identifiers are hashed
/// again and the digests compared bytewise, so the order cannot be steered
/// by choosing a key whose identifier happens to be small. Both sides of a
/// race compute this from public data only and reach mirrored answers.
pub fn compare(a: &PeerId, b: &PeerId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    Hash::hash(a.as_bytes()).cmp(&Hash::hash(b.as_bytes()))
}
