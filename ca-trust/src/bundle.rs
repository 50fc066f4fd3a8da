//! Deduplicated certificate set rendered as one PEM document.

use std::collections::HashSet;

use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::pem::PemObject;
use tracing::debug;

use crate::cert::Certificate;
use crate::errors::{TrustError, TrustResult};

/// Certificates in first-seen order, one per fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustBundle {
    certs: Vec<Certificate>,
    seen: HashSet<String>,
}

impl TrustBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `cert` unless one with the same fingerprint is already present.
    pub fn push(&mut self, cert: Certificate) -> bool {
        if !self.seen.insert(cert.fingerprint().to_string()) {
            return false;
        }
        self.certs.push(cert);
        true
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.certs.iter()
    }

    pub fn to_pem(&self) -> String {
        self.certs.iter().map(Certificate::to_pem).collect()
    }

    /// Parses every `CERTIFICATE` block of `pem`. Other block types are ignored.
    pub fn from_pem(pem: &str) -> TrustResult<Self> {
        let mut bundle = Self::new();
        for der in CertificateDer::pem_slice_iter(pem.as_bytes()) {
            let der = der.map_err(|e| TrustError::Bundle(e.to_string()))?;
            bundle.push(Certificate::from_der(der));
        }
        Ok(bundle)
    }

    /// Every certificate as a trust anchor. Certificates webpki cannot use as
    /// an anchor are skipped.
    pub fn root_store(&self) -> RootCertStore {
        let mut store = RootCertStore::empty();
        let (added, ignored) =
            store.add_parsable_certificates(self.certs.iter().map(|c| c.der().clone()));
        debug!(added, ignored, "trust bundle loaded into root store");
        store
    }
}
