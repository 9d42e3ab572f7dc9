//! # peertls
//!
//! Authenticated TLS sessions between peers with self-certifying identities.
//!
//! ## Features
//!
//! - **Self-certifying identities**: a peer id is the BLAKE3 hash of an
//!   Ed25519 host key, no certificate authority involved
//! - **TLS 1.3** (optionally 1.2) via rustls, with an ephemeral certificate
//!   that carries a host-key signature
//! - **Caller-controlled cancellation** of every handshake through [`Context`]
//! - **Simultaneous connect resolution**: two peers dialling each other over
//!   one connection still end up with exactly one session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peertls::{memory, Context, Keypair, Transport, TransportConfig};
//!
//! # async fn demo() -> Result<(), peertls::TransportError> {
//! let config = TransportConfig::default();
//! let alice = Transport::new(Keypair::generate(), &config)?;
//! let bob = Transport::new(Keypair::generate(), &config)?;
//!
//! let (a, b) = memory::pipe();
//! let ctx = Context::new();
//! let (to_bob, from_alice) = tokio::join!(
//!     alice.secure_outbound(&ctx, a, bob.local_peer()),
//!     bob.secure_inbound(&ctx, b),
//! );
//! assert_eq!(to_bob?.remote_peer(), bob.local_peer());
//! assert_eq!(from_alice?.remote_peer(), alice.local_peer());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 CALLER                      │
//! │   raw stream + Context + expected PeerId    │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              TRANSPORT LAYER                │
//! │  secure_inbound | secure_outbound | races   │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │                 TLS LAYER                   │
//! │  Credentials | PeerVerifier | key slot      │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               CRYPTO LAYER                  │
//! │        Ed25519 | BLAKE3 | PeerId order      │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod crypto;
pub mod session;
pub mod tls;
pub mod transport;

/// Protocol identifier announced when negotiating this transport
pub const PROTOCOL_ID: &str = "/tls/1.0.0";

// Re-export main types at crate root
pub use config::{ConfigError, TlsVersion, TransportConfig};
pub use context::Context;
pub use crypto::{compare, CryptoError, CryptoResult, Keypair, PeerId, PublicKey};
pub use session::SecureSession;
pub use transport::{
    memory, RecordPaced, Role, SecureTransport, Transport, TransportError, TransportResult,
};
