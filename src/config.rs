//! Transport configuration
//!
//! The TLS protocol floor is an explicit value handed to the rustls config
//! builders when credentials are created. Nothing here touches process-wide
//! state.

use std::path::Path;
use std::time::Duration;

use rustls::SupportedProtocolVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Lowest TLS version a handshake may negotiate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsVersion {
    /// TLS 1.2 and 1.3
    Tls12,
    /// TLS 1.3 only
    #[default]
    Tls13,
}

/// Errors loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`TransportConfig`]
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings shared by every handshake a [`Transport`](crate::Transport) runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Lowest TLS version accepted
    pub min_tls_version: TlsVersion,

    /// Deadline applied by front-ends that build their own [`Context`](crate::Context).
    /// The transport itself never times out.
    pub handshake_timeout_secs: Option<u64>,
}

impl TransportConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Protocol versions to enable, highest first
    pub fn protocol_versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        match self.min_tls_version {
            TlsVersion::Tls12 => rustls::ALL_VERSIONS,
            TlsVersion::Tls13 => TLS13_ONLY,
        }
    }

    /// The configured handshake timeout
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs.map(Duration::from_secs)
    }
}
