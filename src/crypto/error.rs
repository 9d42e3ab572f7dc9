//! Key material error types

use thiserror::Error;

/// Errors produced while decoding or using host key material
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The provided key has an invalid length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// The provided signature has an invalid length
    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Expected signature length in bytes
        expected: usize,
        /// Actual signature length in bytes
        actual: usize,
    },

    /// Signature verification failed - the signature is invalid
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// The public key bytes do not encode a curve point
    #[error("Invalid public key format")]
    InvalidPublicKey,

    /// The secret key does not match the public key stored next to it
    #[error("Invalid secret key format")]
    InvalidSecretKey,

    /// A hex string could not be decoded
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),
}

/// Result type for key material operations
pub type CryptoResult<T> = Result<T, CryptoError>;
