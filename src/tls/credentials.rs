//! Handshake configurations for one host identity

use std::sync::Arc;

use rustls::client::Resumption;
use rustls::crypto::CryptoProvider;
use rustls::server::NoServerSessionStorage;
use rustls::{ClientConfig, ServerConfig, SupportedProtocolVersion};

use super::certificate::LocalCertificate;
use super::slot::{key_slot, KeyReceiver};
use super::verifier::PeerVerifier;
use crate::config::TransportConfig;
use crate::crypto::{Keypair, PeerId};
use crate::transport::{TransportError, TransportResult};

/// rustls configuration for a single handshake attempt, in either role
#[derive(Clone)]
pub struct HandshakeConfig {
    client: Arc<ClientConfig>,
    server: Arc<ServerConfig>,
}

impl HandshakeConfig {
    /// Configuration for running the handshake as the client
    pub fn client(&self) -> Arc<ClientConfig> {
        self.client.clone()
    }

    /// Configuration for running the handshake as the server
    pub fn server(&self) -> Arc<ServerConfig> {
        self.server.clone()
    }
}

impl std::fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeConfig").finish_non_exhaustive()
    }
}

/// A host's certificate plus the settings every handshake config shares
///
/// Every call to [`config_for_any`](Credentials::config_for_any) or
/// [`config_for_peer`](Credentials::config_for_peer) builds new rustls
/// configs around a new verifier, so each attempt gets its own key slot and
/// no session state carries over between attempts.
pub struct Credentials {
    certificate: LocalCertificate,
    provider: Arc<CryptoProvider>,
    versions: &'static [&'static SupportedProtocolVersion],
}

impl Credentials {
    /// Certify a fresh TLS key with `host`
    pub fn new(host: &Keypair, config: &TransportConfig) -> TransportResult<Self> {
        let certificate = LocalCertificate::generate(host)
            .map_err(|e| TransportError::Credential(e.to_string()))?;

        let credentials = Credentials {
            certificate,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            versions: config.protocol_versions(),
        };
        // Surface config errors at construction rather than on first dial.
        credentials.config_for_any()?;
        Ok(credentials)
    }

    /// Accept any peer that presents a self-consistent credential
    pub fn config_for_any(&self) -> TransportResult<(HandshakeConfig, KeyReceiver)> {
        self.build(None)
    }

    /// Accept only a credential for `expected`
    pub fn config_for_peer(
        &self,
        expected: PeerId,
    ) -> TransportResult<(HandshakeConfig, KeyReceiver)> {
        self.build(Some(expected))
    }

    fn build(&self, expected: Option<PeerId>) -> TransportResult<(HandshakeConfig, KeyReceiver)> {
        let (keys, receiver) = key_slot();
        let verifier = Arc::new(PeerVerifier::new(expected, keys, self.provider.clone()));

        let mut client = ClientConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(self.versions)?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_client_auth_cert(self.certificate.chain(), self.certificate.private_key())?;
        client.resumption = Resumption::disabled();

        let mut server = ServerConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(self.versions)?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.certificate.chain(), self.certificate.private_key())?;
        server.session_storage = Arc::new(NoServerSessionStorage {});
        server.send_tls13_tickets = 0;

        Ok((
            HandshakeConfig {
                client: Arc::new(client),
                server: Arc::new(server),
            },
            receiver,
        ))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("versions", &self.versions)
            .finish_non_exhaustive()
    }
}
