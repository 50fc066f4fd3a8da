//! Live certificate chain capture over TLS.
//!
//! The handshake accepts whatever chain the server sends so private and
//! self-signed roots can be recorded. The accepting verifier is private to
//! this module; connections are dropped right after the handshake.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::cert::Certificate;
use crate::errors::{HandshakeError, TrustError, TrustResult};

pub const HTTPS_PORT: u16 = 443;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can report the chain a host presents, leaf first.
pub trait ChainSource: Send + Sync {
    fn fetch_chain(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Vec<Certificate>, HandshakeError>> + Send;
}

/// Accepts any server chain while still checking that the handshake
/// signatures were made with the presented leaf key.
#[derive(Debug)]
struct AcceptAnyChain {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyChain {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Captures chains with a real TLS handshake.
#[derive(Clone)]
pub struct TlsChainSource {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl TlsChainSource {
    /// Handshakes against port 443 with the given timeout.
    pub fn new(timeout: Duration) -> TrustResult<Self> {
        let provider = Arc::new(ring::default_provider());
        let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::Config(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyChain { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            port: HTTPS_PORT,
            timeout,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn handshake(&self, host: &str) -> Result<Vec<Certificate>, HandshakeError> {
        let name = ServerName::try_from(host.to_string()).map_err(|_| HandshakeError::InvalidName {
            host: host.to_string(),
        })?;

        let tcp = TcpStream::connect((host, self.port))
            .await
            .map_err(|source| HandshakeError::Connect {
                host: host.to_string(),
                port: self.port,
                source,
            })?;

        let tls = self
            .connector
            .connect(name, tcp)
            .await
            .map_err(|e| HandshakeError::Tls {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let (_, session) = tls.get_ref();
        let chain: Vec<Certificate> = session
            .peer_certificates()
            .unwrap_or_default()
            .iter()
            .map(|der| Certificate::from_der(der.clone().into_owned()))
            .collect();

        if chain.is_empty() {
            return Err(HandshakeError::NoCertificates {
                host: host.to_string(),
            });
        }
        Ok(chain)
    }
}

impl ChainSource for TlsChainSource {
    async fn fetch_chain(&self, host: &str) -> Result<Vec<Certificate>, HandshakeError> {
        let chain = tokio::time::timeout(self.timeout, self.handshake(host))
            .await
            .map_err(|_| HandshakeError::Timeout {
                host: host.to_string(),
                timeout: self.timeout,
            })??;
        debug!("{}:{} presented {} certificate(s)", host, self.port, chain.len());
        Ok(chain)
    }
}
