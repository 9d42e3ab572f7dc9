//! Securing raw connections
//!
//! [`Transport`] turns a raw bidirectional byte stream into a
//! [`SecureSession`] bound to a verified remote [`PeerId`]. Inbound
//! connections are answered as TLS server; outbound connections are dialled
//! as TLS client, pinned to the peer the caller expects.
//!
//! # Simultaneous connect
//!
//! When two peers dial each other at the same moment and end up sharing one
//! connection, both start as TLS client. Each side then sees the other's
//! ClientHello, fails, and sends an `unexpected_message` alert. The outbound
//! path recognises that failure and resolves it:
//!
//! 1. run a server-role handshake on the same connection, expecting it to
//!    fail with the partner's alert (the "drain");
//! 2. compare the two peer ids; the smaller retries as client, the larger as
//!    server, and equal ids mean we dialled ourselves;
//! 3. retry exactly once, pinned to the expected peer.
//!
//! The whole sequence runs under the caller's [`Context`].

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

mod error;
mod framing;
mod handshake;
mod race;
mod registry;

pub use error::{TransportError, TransportResult};
pub use framing::RecordPaced;
pub use handshake::Role;

use self::handshake::{Established, HandshakeFailure};
use self::registry::RaceRegistry;
use crate::config::TransportConfig;
use crate::context::Context;
use crate::crypto::{compare, Keypair, PeerId};
use crate::session::SecureSession;
use crate::tls::Credentials;
use crate::PROTOCOL_ID;

/// Anything that can secure a raw connection of type `S`
#[async_trait]
pub trait SecureTransport<S>: Send + Sync
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Secure a connection the remote peer opened
    async fn secure_inbound(&self, ctx: &Context, conn: S) -> TransportResult<SecureSession<S>>;

    /// Secure a connection we opened to `expected`
    async fn secure_outbound(
        &self,
        ctx: &Context,
        conn: S,
        expected: PeerId,
    ) -> TransportResult<SecureSession<S>>;

    /// Identifier used to negotiate this transport above the raw connection
    fn protocol_id(&self) -> &'static str {
        PROTOCOL_ID
    }
}

/// A host identity ready to secure connections
///
/// Cheap to share: every method takes `&self`, and concurrent calls on
/// different connections are independent.
#[derive(Debug)]
pub struct Transport {
    local_peer: PeerId,
    keypair: Arc<Keypair>,
    credentials: Credentials,
    races: RaceRegistry,
}

impl Transport {
    /// Create a transport for `keypair`
    pub fn new(keypair: Keypair, config: &TransportConfig) -> TransportResult<Self> {
        let credentials = Credentials::new(&keypair, config)?;
        let local_peer = keypair.peer_id();
        debug!(peer = %local_peer, "transport ready");

        Ok(Transport {
            local_peer,
            keypair: Arc::new(keypair),
            credentials,
            races: RaceRegistry::default(),
        })
    }

    /// Create a transport from exported host key bytes
    ///
    /// Accepts a 32-byte seed or the 64-byte form of
    /// [`Keypair::to_bytes`].
    pub fn from_secret_bytes(bytes: &[u8], config: &TransportConfig) -> TransportResult<Self> {
        let keypair = Keypair::from_bytes(bytes).map_err(TransportError::IdentityDerivation)?;
        Self::new(keypair, config)
    }

    /// Our peer id
    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// Our host keypair
    pub fn keypair(&self) -> &Arc<Keypair> {
        &self.keypair
    }

    /// Secure a connection the remote peer opened, accepting any peer
    pub async fn secure_inbound<S>(
        &self,
        ctx: &Context,
        conn: S,
    ) -> TransportResult<SecureSession<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (config, keys) = self.credentials.config_for_any()?;
        let conn = RecordPaced::new(conn);

        match handshake::run(ctx, Role::Server, &config, keys, conn).await {
            Ok(established) => self.adapt(ctx, established),
            Err(failure) => Err(failure.error),
        }
    }

    /// Secure a connection we opened, accepting only `expected`
    ///
    /// Resolves a simultaneous connect with `expected` if one is detected.
    pub async fn secure_outbound<S>(
        &self,
        ctx: &Context,
        conn: S,
        expected: PeerId,
    ) -> TransportResult<SecureSession<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (config, keys) = self.credentials.config_for_peer(expected)?;
        let conn = RecordPaced::new(conn);

        match handshake::run(ctx, Role::Client, &config, keys, conn).await {
            Ok(established) => self.adapt(ctx, established),
            Err(HandshakeFailure {
                error: TransportError::Handshake(err),
                conn: Some(conn),
            }) if race::is_simultaneous_open(&err) => {
                self.resolve_simultaneous_connect(ctx, conn, expected).await
            }
            Err(failure) => Err(failure.error),
        }
    }

    async fn resolve_simultaneous_connect<S>(
        &self,
        ctx: &Context,
        conn: RecordPaced<S>,
        remote: PeerId,
    ) -> TransportResult<SecureSession<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(_ticket) = self.races.try_enter(remote) else {
            warn!(%remote, "simultaneous connect already being resolved");
            return Err(TransportError::SimultaneousConnectOverlap(remote));
        };
        info!(%remote, "simultaneous connect detected");

        // The partner's alert is the next record on the connection.
        let (config, keys) = self.credentials.config_for_any()?;
        let conn = match handshake::run(ctx, Role::Server, &config, keys, conn).await {
            Err(HandshakeFailure {
                error: TransportError::Handshake(err),
                conn: Some(conn),
            }) if race::is_drain_alert(&err) => conn,
            Err(failure) if failure.error.is_cancellation() => return Err(failure.error),
            Err(failure) => {
                warn!(%remote, error = %failure.error, "unexpected drain failure");
                return Err(TransportError::SimultaneousConnectProtocol);
            }
            Ok(_) => {
                warn!(%remote, "drain handshake unexpectedly succeeded");
                return Err(TransportError::SimultaneousConnectProtocol);
            }
        };
        debug!(%remote, "drain alert received");

        let role = match compare(&self.local_peer, &remote) {
            Ordering::Equal => return Err(TransportError::SimultaneousConnectSelf),
            Ordering::Less => Role::Client,
            Ordering::Greater => Role::Server,
        };
        info!(%remote, ?role, "retry role assigned");

        let (config, keys) = self.credentials.config_for_peer(remote)?;
        match handshake::run(ctx, role, &config, keys, conn).await {
            Ok(established) => self.adapt(ctx, established),
            Err(failure) => Err(failure.error),
        }
    }

    fn adapt<S>(
        &self,
        ctx: &Context,
        established: Established<RecordPaced<S>>,
    ) -> TransportResult<SecureSession<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        SecureSession::adapt(
            established.stream,
            self.local_peer,
            Arc::clone(&self.keypair),
            &established.remote_public_key,
        )
        .map_err(|err| ctx.err().unwrap_or(err))
    }
}

#[async_trait]
impl<S> SecureTransport<S> for Transport
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn secure_inbound(&self, ctx: &Context, conn: S) -> TransportResult<SecureSession<S>> {
        Transport::secure_inbound(self, ctx, conn).await
    }

    async fn secure_outbound(
        &self,
        ctx: &Context,
        conn: S,
        expected: PeerId,
    ) -> TransportResult<SecureSession<S>> {
        Transport::secure_outbound(self, ctx, conn, expected).await
    }
}

/// In-memory connections for tests and demos
pub mod memory {
    use tokio::io::DuplexStream;

    /// Buffer size of each direction; large enough for a full TLS flight
    const PIPE_CAPACITY: usize = 64 * 1024;

    /// A pair of connected in-memory byte streams
    pub fn pipe() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(PIPE_CAPACITY)
    }
}
