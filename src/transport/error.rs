//! Errors returned by connection establishment

use std::io;

use rustls::Error as TlsError;
use thiserror::Error;

use crate::crypto::{CryptoError, PeerId};

/// Everything that can go wrong securing a connection
#[derive(Error, Debug)]
pub enum TransportError {
    /// The local host key could not be decoded
    #[error("Invalid local host key: {0}")]
    IdentityDerivation(#[source] CryptoError),

    /// The local TLS credential could not be generated
    #[error("Failed to generate TLS credential: {0}")]
    Credential(String),

    /// rustls rejected the generated configuration
    #[error("TLS configuration error: {0}")]
    Config(#[from] TlsError),

    /// The TLS handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The remote credential was rejected, including a pinned-peer mismatch
    #[error("Remote credential rejected: {0}")]
    Verification(TlsError),

    /// The caller cancelled the context
    #[error("Handshake cancelled")]
    Cancelled,

    /// The context deadline passed
    #[error("Handshake deadline exceeded")]
    DeadlineExceeded,

    /// A simultaneous connect turned out to be a connection to ourselves
    #[error("Simultaneous connect to self")]
    SimultaneousConnectSelf,

    /// The race partner did not send the expected alert during the drain
    #[error("Simultaneous connect: did not receive the expected TLS alert")]
    SimultaneousConnectProtocol,

    /// A simultaneous connect with this peer is already being resolved
    #[error("Simultaneous connect with {0} is already being resolved")]
    SimultaneousConnectOverlap(PeerId),

    /// An invariant of the handshake machinery did not hold
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(&'static str),

    /// The remote public key could not be turned into a peer id
    #[error("Invalid remote public key: {0}")]
    RemotePeerIdDerivation(#[source] CryptoError),
}

impl TransportError {
    /// Sort a raw handshake failure into credential rejections and the rest
    pub(crate) fn from_handshake(err: io::Error) -> Self {
        let rejected = tls_error(&err)
            .filter(|tls| matches!(tls, TlsError::InvalidCertificate(_)))
            .cloned();
        match rejected {
            Some(tls) => TransportError::Verification(tls),
            None => TransportError::Handshake(err),
        }
    }

    /// Whether this error reports a cancelled or expired context
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TransportError::Cancelled | TransportError::DeadlineExceeded
        )
    }
}

/// The rustls error inside an I/O error raised by tokio-rustls, if any
pub(crate) fn tls_error(err: &io::Error) -> Option<&TlsError> {
    err.get_ref()?.downcast_ref::<TlsError>()
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
