//! One cancellable TLS handshake attempt
//!
//! rustls drives the handshake through tokio-rustls futures, which have no
//! notion of a caller deadline. The attempt is therefore raced against the
//! [`Context`] in a single `select!`: if the context finishes first, the
//! handshake future is dropped and the connection it owns is closed with it.
//! Nothing is spawned, so the attempt is fully torn down when [`run`]
//! returns and the connection can be reused by the next attempt.

use std::net::{IpAddr, Ipv4Addr};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};
use tracing::debug;

use super::error::TransportError;
use crate::context::Context;
use crate::tls::{HandshakeConfig, KeyReceiver};

/// Which side of the TLS handshake to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the ClientHello
    Client,
    /// Answers the ClientHello
    Server,
}

/// A completed handshake and the remote key its verifier delivered
pub(crate) struct Established<S> {
    pub(crate) stream: TlsStream<S>,
    pub(crate) remote_public_key: Vec<u8>,
}

/// A failed attempt
///
/// `conn` is handed back when the connection is still usable for another
/// attempt, and is `None` once it has been closed.
pub(crate) struct HandshakeFailure<S> {
    pub(crate) error: TransportError,
    pub(crate) conn: Option<S>,
}

impl<S> HandshakeFailure<S> {
    fn closed(error: TransportError) -> Self {
        HandshakeFailure { error, conn: None }
    }
}

/// Placeholder name for the client side; the verifier ignores it, and an IP
/// address keeps SNI out of the ClientHello.
fn server_name() -> ServerName<'static> {
    ServerName::IpAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED).into())
}

/// Run one handshake over `conn` in `role`
pub(crate) async fn run<S>(
    ctx: &Context,
    role: Role,
    config: &HandshakeConfig,
    keys: KeyReceiver,
    conn: S,
) -> Result<Established<S>, HandshakeFailure<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(reason) = ctx.err() {
        debug!(?role, %reason, "context already done, closing connection");
        drop(conn);
        return Err(HandshakeFailure::closed(reason));
    }

    let handshake = async move {
        match role {
            Role::Client => TlsConnector::from(config.client())
                .connect(server_name(), conn)
                .into_fallible()
                .await
                .map(TlsStream::from),
            Role::Server => TlsAcceptor::from(config.server())
                .accept(conn)
                .into_fallible()
                .await
                .map(TlsStream::from),
        }
    };

    let outcome = tokio::select! {
        biased;
        outcome = handshake => outcome,
        reason = ctx.done() => {
            debug!(?role, %reason, "context done during handshake, closing connection");
            return Err(HandshakeFailure::closed(reason));
        }
    };

    match outcome {
        Err((err, conn)) => {
            if let Some(reason) = ctx.err() {
                debug!(?role, %err, "handshake failed after context was done");
                drop(conn);
                return Err(HandshakeFailure::closed(reason));
            }
            debug!(?role, %err, "handshake failed");
            Err(HandshakeFailure {
                error: TransportError::from_handshake(err),
                conn: Some(conn),
            })
        }
        Ok(stream) => match keys.try_take() {
            Some(remote_public_key) => Ok(Established {
                stream,
                remote_public_key,
            }),
            None => Err(HandshakeFailure::closed(
                TransportError::InternalConsistency(
                    "handshake succeeded but no remote public key was delivered",
                ),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::crypto::Keypair;
    use crate::tls::{key_slot, Credentials};
    use crate::transport::memory;

    fn credentials() -> (Keypair, Credentials) {
        let keypair = Keypair::generate();
        let credentials = Credentials::new(&keypair, &TransportConfig::default()).unwrap();
        (keypair, credentials)
    }

    #[tokio::test]
    async fn test_handshake_delivers_remote_keys() {
        let (client_key, client) = credentials();
        let (server_key, server) = credentials();
        let (a, b) = memory::pipe();
        let ctx = Context::new();

        let (client_config, client_keys) = client.config_for_peer(server_key.peer_id()).unwrap();
        let (server_config, server_keys) = server.config_for_any().unwrap();

        let (c, s) = tokio::join!(
            run(&ctx, Role::Client, &client_config, client_keys, a),
            run(&ctx, Role::Server, &server_config, server_keys, b),
        );
        let c = c.ok().unwrap();
        let s = s.ok().unwrap();

        assert_eq!(c.remote_public_key, server_key.public_key().as_bytes().to_vec());
        assert_eq!(s.remote_public_key, client_key.public_key().as_bytes().to_vec());
        assert!(matches!(c.stream, TlsStream::Client(_)));
        assert!(matches!(s.stream, TlsStream::Server(_)));
    }

    #[tokio::test]
    async fn test_empty_key_slot_is_internal_error() {
        let (_, client) = credentials();
        let (server_key, server) = credentials();
        let (a, b) = memory::pipe();
        let ctx = Context::new();

        let (client_config, _delivered_here) =
            client.config_for_peer(server_key.peer_id()).unwrap();
        let (_never_written, empty) = key_slot();
        let (server_config, server_keys) = server.config_for_any().unwrap();

        let (c, _s) = tokio::join!(
            run(&ctx, Role::Client, &client_config, empty, a),
            run(&ctx, Role::Server, &server_config, server_keys, b),
        );

        let failure = c.err().unwrap();
        assert!(matches!(
            failure.error,
            TransportError::InternalConsistency(_)
        ));
        assert!(failure.conn.is_none());
    }

    #[tokio::test]
    async fn test_precancelled_context_closes_connection() {
        use tokio::io::AsyncReadExt;

        let (_, client) = credentials();
        let (a, mut b) = memory::pipe();
        let ctx = Context::new();
        ctx.cancel();

        let (config, keys) = client.config_for_any().unwrap();
        let failure = run(&ctx, Role::Client, &config, keys, a).await.err().unwrap();
        assert!(matches!(failure.error, TransportError::Cancelled));
        assert!(failure.conn.is_none());

        // Nothing was sent and the connection is closed.
        let mut buf = Vec::new();
        assert_eq!(b.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_attempt_returns_connection() {
        let (_, client) = credentials();
        let (a, b) = memory::pipe();
        drop(b);
        let ctx = Context::new();

        let (config, keys) = client.config_for_any().unwrap();
        let failure = run(&ctx, Role::Server, &config, keys, a).await.err().unwrap();
        assert!(matches!(failure.error, TransportError::Handshake(_)));
        assert!(failure.conn.is_some());
    }
}
