//! Captured X.509 certificates.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};

/// A DER certificate together with its SHA-256 fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: CertificateDer<'static>,
    fingerprint: String,
}

impl Certificate {
    pub fn from_der(der: impl Into<CertificateDer<'static>>) -> Self {
        let der = der.into();
        let fingerprint = fingerprint(der.as_ref());
        Self { der, fingerprint }
    }

    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// Lowercase hex SHA-256 over the raw DER.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// One `CERTIFICATE` PEM block, base64 wrapped at 64 columns.
    pub fn to_pem(&self) -> String {
        let body = STANDARD.encode(self.der.as_ref());
        let mut pem = String::with_capacity(body.len() + body.len() / 64 + 64);
        pem.push_str("-----BEGIN CERTIFICATE-----\n");
        for line in body.as_bytes().chunks(64) {
            // base64 output is ASCII
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str("-----END CERTIFICATE-----\n");
        pem
    }
}

/// Content fingerprint of a DER certificate. Pure and deterministic.
pub fn fingerprint(der: &[u8]) -> String {
    format!("{:x}", Sha256::digest(der))
}
