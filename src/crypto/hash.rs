//! BLAKE3 hashing
//!
//! Peer identifiers and the simultaneous-connect tie-break are both defined
//! in terms of this hash.

/// Size of a hash output in bytes
pub const HASH_SIZE: usize = 32;

/// A hash output
pub type HashOutput = [u8; HASH_SIZE];

/// Hashing operations
pub struct Hash;

impl Hash {
    /// Compute hash of data
    pub fn hash(data: &[u8]) -> HashOutput {
        blake3::hash(data).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(Hash::hash(b"peer"), Hash::hash(b"peer"));
        assert_ne!(Hash::hash(b"peer"), Hash::hash(b"Peer"));
    }

    #[test]
    fn test_hash_size() {
        assert_eq!(Hash::hash(b"peer").len(), HASH_SIZE);
    }
}
