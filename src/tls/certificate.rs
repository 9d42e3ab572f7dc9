//! Self-certifying TLS certificates
//!
//! Each transport presents an ephemeral, self-signed ECDSA certificate. The
//! certificate carries a private extension holding the host's Ed25519 public
//! key and a host-key signature over the certificate's SubjectPublicKeyInfo.
//! Anyone can check that the certificate key was authorised by the host key
//! and derive the host's [`PeerId`] from it, without a certificate authority.
//!
//! Extension value layout: `key_len (1 byte) || public_key || signature`.

use rcgen::{CertificateParams, CustomExtension, DnType};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::crypto::{CryptoError, Keypair, PeerId, PublicKey, SignatureBytes};

/// OID of the host key extension
pub const HOST_KEY_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 53594, 1, 1];

const HOST_KEY_EXTENSION_OID_STR: &str = "1.3.6.1.4.1.53594.1.1";

/// Domain separation prefix for the host-key signature
pub const SIGNATURE_PREFIX: &[u8] = b"peertls-handshake:";

/// Why a presented certificate was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Not a parseable X.509 certificate
    #[error("Certificate is not valid DER")]
    BadEncoding,

    /// The certificate has no host key extension
    #[error("Certificate has no host key extension")]
    MissingExtension,

    /// The host key extension could not be decoded
    #[error("Malformed host key extension")]
    MalformedExtension,

    /// The certificate is outside its validity period
    #[error("Certificate is expired or not yet valid")]
    Expired,

    /// The host key or its signature is invalid
    #[error("Host key check failed: {0}")]
    HostKey(#[from] CryptoError),
}

/// The local certificate and its private key
pub(crate) struct LocalCertificate {
    chain: Vec<CertificateDer<'static>>,
    key: PrivatePkcs8KeyDer<'static>,
}

impl LocalCertificate {
    /// Generate a fresh certificate key and certify it with `host`
    pub(crate) fn generate(host: &Keypair) -> Result<Self, rcgen::Error> {
        let cert_key = rcgen::KeyPair::generate()?;
        let spki = cert_key.public_key_der();
        let signature = host.sign(&[SIGNATURE_PREFIX, spki.as_slice()].concat());

        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params
            .distinguished_name
            .push(DnType::CommonName, "peertls");
        params.custom_extensions.push(CustomExtension::from_oid_content(
            HOST_KEY_EXTENSION_OID,
            encode_extension(host.public_key(), &signature),
        ));

        let certificate = params.self_signed(&cert_key)?;

        Ok(LocalCertificate {
            chain: vec![certificate.der().clone()],
            key: PrivatePkcs8KeyDer::from(cert_key.serialize_der()),
        })
    }

    pub(crate) fn chain(&self) -> Vec<CertificateDer<'static>> {
        self.chain.clone()
    }

    pub(crate) fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(self.key.clone_key())
    }
}

/// A certificate whose host key extension checked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// Encoded host public key, as carried in the extension
    pub public_key: Vec<u8>,
    /// Identifier derived from that key
    pub peer_id: PeerId,
}

/// Check a presented certificate and extract the host key it certifies
///
/// Only the binding between the certificate key and the host key is checked
/// here. That the peer owns the certificate key is proven by the TLS
/// handshake signature, which the verifier checks separately.
pub fn verify(certificate: &CertificateDer<'_>) -> Result<VerifiedCredential, CredentialError> {
    let (_, x509) = X509Certificate::from_der(certificate.as_ref())
        .map_err(|_| CredentialError::BadEncoding)?;

    if !x509.validity().is_valid() {
        return Err(CredentialError::Expired);
    }

    let extension = x509
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == HOST_KEY_EXTENSION_OID_STR)
        .ok_or(CredentialError::MissingExtension)?;
    let (key_bytes, signature_bytes) = decode_extension(extension.value)?;

    let public_key = PublicKey::from_bytes(key_bytes)?;
    let signature = SignatureBytes::from_bytes(signature_bytes)?;
    let message = [SIGNATURE_PREFIX, x509.public_key().raw].concat();
    public_key.verify(&message, &signature)?;

    Ok(VerifiedCredential {
        public_key: key_bytes.to_vec(),
        peer_id: public_key.to_peer_id(),
    })
}

fn encode_extension(public_key: &PublicKey, signature: &SignatureBytes) -> Vec<u8> {
    let key = public_key.as_bytes();
    let mut value = Vec::with_capacity(1 + key.len() + signature.as_bytes().len());
    value.push(key.len() as u8);
    value.extend_from_slice(key);
    value.extend_from_slice(signature.as_bytes());
    value
}

fn decode_extension(value: &[u8]) -> Result<(&[u8], &[u8]), CredentialError> {
    let (&key_len, rest) = value
        .split_first()
        .ok_or(CredentialError::MalformedExtension)?;
    let key_len = key_len as usize;
    if rest.len() < key_len {
        return Err(CredentialError::MalformedExtension);
    }
    Ok(rest.split_at(key_len))
}
