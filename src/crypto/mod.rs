//! Host key material for peertls
//!
//! - `keys`: Ed25519 host keypairs and public keys
//! - `peer_id`: identifiers derived from public keys, and their tie-break order
//! - `hash`: BLAKE3 hashing

pub mod error;
pub mod hash;
pub mod keys;
pub mod peer_id;

pub use error::{CryptoError, CryptoResult};
pub use hash::Hash;
pub use keys::{Keypair, PublicKey, SignatureBytes};
pub use peer_id::{compare, PeerId};
