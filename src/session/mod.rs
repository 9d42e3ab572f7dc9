//! Established secure sessions
//!
//! A [`SecureSession`] is the product of a successful handshake: an
//! encrypted byte stream plus the identities at both ends. The remote peer
//! id is always derived from the remote public key the handshake verified,
//! so the two cannot disagree.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_rustls::TlsStream;

use crate::crypto::{Keypair, PeerId, PublicKey};
use crate::transport::{RecordPaced, Role, TransportError, TransportResult};

/// An authenticated, encrypted connection to a verified peer
pub struct SecureSession<S> {
    stream: TlsStream<RecordPaced<S>>,
    local_peer: PeerId,
    local_keypair: Arc<Keypair>,
    remote_peer: PeerId,
    remote_public_key: PublicKey,
}

impl<S> SecureSession<S> {
    /// Bind a completed TLS stream to the identities at both ends
    ///
    /// `remote_public_key` is the host key delivered by the verifier; it
    /// fails with [`TransportError::RemotePeerIdDerivation`] if it is not a
    /// valid public key.
    pub(crate) fn adapt(
        stream: TlsStream<RecordPaced<S>>,
        local_peer: PeerId,
        local_keypair: Arc<Keypair>,
        remote_public_key: &[u8],
    ) -> TransportResult<Self> {
        let remote_public_key =
            PublicKey::from_bytes(remote_public_key).map_err(TransportError::RemotePeerIdDerivation)?;

        Ok(SecureSession {
            stream,
            local_peer,
            local_keypair,
            remote_peer: remote_public_key.to_peer_id(),
            remote_public_key,
        })
    }

    /// Our peer id
    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// Our host keypair
    pub fn local_keypair(&self) -> &Arc<Keypair> {
        &self.local_keypair
    }

    /// The verified remote peer id
    pub fn remote_peer(&self) -> PeerId {
        self.remote_peer
    }

    /// The verified remote host key
    pub fn remote_public_key(&self) -> &PublicKey {
        &self.remote_public_key
    }

    /// The TLS role this side ended up playing
    pub fn role(&self) -> Role {
        match self.stream {
            TlsStream::Client(_) => Role::Client,
            TlsStream::Server(_) => Role::Server,
        }
    }

    /// The raw connection underneath
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref().0.get_ref()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SecureSession<S> {
    /// Send close_notify and shut down the write side of the connection
    pub async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl<S> std::fmt::Debug for SecureSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("local_peer", &self.local_peer)
            .field("remote_peer", &self.remote_peer)
            .field("role", &self.role())
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for SecureSession<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for SecureSession<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::context::Context as CallContext;
    use crate::transport::{memory, Transport};
    use tokio::io::{AsyncReadExt, DuplexStream};

    async fn connected() -> (
        Transport,
        Transport,
        SecureSession<DuplexStream>,
        SecureSession<DuplexStream>,
    ) {
        let dialer = Transport::new(Keypair::generate(), &TransportConfig::default()).unwrap();
        let listener = Transport::new(Keypair::generate(), &TransportConfig::default()).unwrap();
        let (a, b) = memory::pipe();
        let ctx = CallContext::new();

        let (out, inb) = tokio::join!(
            dialer.secure_outbound(&ctx, a, listener.local_peer()),
            listener.secure_inbound(&ctx, b),
        );
        (dialer, listener, out.unwrap(), inb.unwrap())
    }

    #[tokio::test]
    async fn test_identities() {
        let (dialer, listener, out, inb) = connected().await;

        assert_eq!(out.local_peer(), dialer.local_peer());
        assert_eq!(out.remote_peer(), listener.local_peer());
        assert_eq!(out.remote_peer(), out.remote_public_key().to_peer_id());
        assert_eq!(inb.remote_peer(), inb.remote_public_key().to_peer_id());
        assert!(Arc::ptr_eq(out.local_keypair(), dialer.keypair()));
    }

    #[tokio::test]
    async fn test_malformed_remote_key() {
        let (_, _, out, _inb) = connected().await;
        let local_peer = out.local_peer();
        let local_keypair = out.local_keypair().clone();

        let err = SecureSession::adapt(out.stream, local_peer, local_keypair, &[1u8; 31])
            .unwrap_err();
        assert!(matches!(err, TransportError::RemotePeerIdDerivation(_)));
    }

    #[tokio::test]
    async fn test_close_is_seen_as_eof() {
        let (_, _, mut out, mut inb) = connected().await;

        out.write_all(b"last words").await.unwrap();
        out.close().await.unwrap();

        let mut received = Vec::new();
        inb.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"last words");
    }

    #[tokio::test]
    async fn test_debug_names_both_peers() {
        let (_, listener, out, _inb) = connected().await;
        let rendered = format!("{:?}", out);
        assert!(rendered.contains("SecureSession"));
        assert!(rendered.contains(&format!("{:?}", listener.local_peer())));
    }
}
