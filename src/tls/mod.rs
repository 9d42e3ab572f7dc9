//! Self-certifying TLS credentials
//!
//! This is the identity side of the transport: it turns a host keypair into
//! rustls client and server configurations whose verifiers accept only
//! self-certifying peer credentials, and reports the verified remote key
//! through a single-shot slot.
//!
//! - `certificate`: credential generation and checking
//! - `verifier`: rustls verifier shared by both roles
//! - `credentials`: per-attempt handshake configs
//! - `slot`: verified key delivery

pub mod certificate;
pub mod credentials;
pub mod slot;
mod verifier;

pub use certificate::{CredentialError, VerifiedCredential};
pub use credentials::{Credentials, HandshakeConfig};
pub use slot::{key_slot, KeyReceiver, KeySender};
