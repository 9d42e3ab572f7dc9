//! Ed25519 host keys
//!
//! A host key is the long-term identity of a peer. Its public half is hashed
//! into the [`PeerId`](super::PeerId) and signed into every TLS credential the
//! peer presents, which is what makes the credential self-certifying.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, CryptoResult};
use super::peer_id::PeerId;

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 public key whose encoding is known to be a valid curve point
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Decode a public key, rejecting wrong lengths and non-points
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string for display
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// The peer identifier this key certifies
    pub fn to_peer_id(&self) -> PeerId {
        PeerId::from_public_key(self)
    }

    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        verifying_key
            .verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes([u8; SIGNATURE_SIZE]);

impl SignatureBytes {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SIGNATURE_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidSignatureLength {
                    expected: SIGNATURE_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(SignatureBytes(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

/// A host keypair
///
/// The secret key is zeroized when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Keypair {
    #[zeroize(skip)]
    public_key: PublicKey,
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(&SigningKey::generate(&mut OsRng))
    }

    /// Create from a 32-byte seed (deterministic generation)
    pub fn from_seed(seed: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self::from_signing_key(&SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        Keypair {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_key: signing_key.to_bytes(),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The peer identifier of this keypair
    pub fn peer_id(&self) -> PeerId {
        self.public_key.to_peer_id()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let signing_key = SigningKey::from_bytes(&self.secret_key);
        SignatureBytes(signing_key.sign(message).to_bytes())
    }

    /// Export as `secret || public`
    ///
    /// WARNING: This exposes the secret key. Handle with extreme care.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE] {
        let mut bytes = [0u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE];
        bytes[..SECRET_KEY_SIZE].copy_from_slice(&self.secret_key);
        bytes[SECRET_KEY_SIZE..].copy_from_slice(&self.public_key.0);
        bytes
    }

    /// Import a keypair
    ///
    /// Accepts either a bare 32-byte seed or the 64-byte export produced by
    /// [`Keypair::to_bytes`]. In the latter case the stored public key must
    /// match the one derived from the secret.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        match bytes.len() {
            SECRET_KEY_SIZE => {
                let mut seed = [0u8; SECRET_KEY_SIZE];
                seed.copy_from_slice(bytes);
                let keypair = Self::from_seed(&seed);
                seed.zeroize();
                Ok(keypair)
            }
            len if len == SECRET_KEY_SIZE + PUBLIC_KEY_SIZE => {
                let mut seed = [0u8; SECRET_KEY_SIZE];
                seed.copy_from_slice(&bytes[..SECRET_KEY_SIZE]);
                let keypair = Self::from_seed(&seed);
                seed.zeroize();

                if keypair.public_key.0[..] != bytes[SECRET_KEY_SIZE..] {
                    return Err(CryptoError::InvalidSecretKey);
                }
                Ok(keypair)
            }
            actual => Err(CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_SIZE + PUBLIC_KEY_SIZE,
                actual,
            }),
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let k1 = Keypair::generate();
        let k2 = Keypair::generate();

        assert_ne!(k1.public_key(), k2.public_key());
        assert_ne!(k1.peer_id(), k2.peer_id());
    }

    #[test]
    fn test_deterministic_generation() {
        let seed = [42u8; 32];
        let k1 = Keypair::from_seed(&seed);
        let k2 = Keypair::from_seed(&seed);

        assert_eq!(k1.public_key(), k2.public_key());
    }

    #[test]
    fn test_sign_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"peertls-handshake:spki");

        assert!(keypair
            .public_key()
            .verify(b"peertls-handshake:spki", &signature)
            .is_ok());
        assert_eq!(
            keypair.public_key().verify(b"something else", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let k1 = Keypair::generate();
        let k2 = Keypair::generate();

        let signature = k1.sign(b"message");
        assert!(k2.public_key().verify(b"message", &signature).is_err());
    }

    #[test]
    fn test_export_import() {
        let keypair = Keypair::generate();

        let restored = Keypair::from_bytes(&keypair.to_bytes()).unwrap();
        assert_eq!(keypair.peer_id(), restored.peer_id());

        let from_seed = Keypair::from_bytes(&keypair.to_bytes()[..SECRET_KEY_SIZE]).unwrap();
        assert_eq!(keypair.peer_id(), from_seed.peer_id());
    }

    #[test]
    fn test_import_rejects_mismatched_public_half() {
        let mut bytes = Keypair::generate().to_bytes();
        bytes[SECRET_KEY_SIZE..].copy_from_slice(Keypair::generate().public_key().as_bytes());

        assert_eq!(
            Keypair::from_bytes(&bytes).unwrap_err(),
            CryptoError::InvalidSecretKey
        );
    }

    #[test]
    fn test_import_rejects_bad_length() {
        assert_eq!(
            Keypair::from_bytes(&[7u8; 10]).unwrap_err(),
            CryptoError::InvalidKeyLength {
                expected: 64,
                actual: 10
            }
        );
    }

    #[test]
    fn test_public_key_hex() {
        let keypair = Keypair::generate();
        let restored = PublicKey::from_hex(&keypair.public_key().to_hex()).unwrap();

        assert_eq!(keypair.public_key(), &restored);
    }

    #[test]
    fn test_public_key_rejects_short_input() {
        assert!(matches!(
            PublicKey::from_bytes(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength { actual: 31, .. })
        ));
    }
}
