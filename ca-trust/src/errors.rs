//! Error types for trust collection.

use std::time::Duration;

use thiserror::Error;

pub type TrustResult<T> = Result<T, TrustError>;

#[derive(Debug, Error)]
pub enum TrustError {
    /// A base URL that does not name a host.
    #[error("cannot resolve TLS host for {url:?}: {reason}")]
    Resolve { url: String, reason: String },

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// PEM text that does not decode into certificates.
    #[error("invalid certificate bundle: {0}")]
    Bundle(String),

    #[error("tls config error: {0}")]
    Config(String),
}

/// Why the chain of one host could not be captured. Always names the host.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("handshake with {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("{host} presented no certificates")]
    NoCertificates { host: String },

    #[error("{host:?} is not a valid TLS server name")]
    InvalidName { host: String },
}

impl HandshakeError {
    pub fn host(&self) -> &str {
        match self {
            HandshakeError::Connect { host, .. }
            | HandshakeError::Tls { host, .. }
            | HandshakeError::Timeout { host, .. }
            | HandshakeError::NoCertificates { host }
            | HandshakeError::InvalidName { host } => host,
        }
    }
}
