//! Collector settings from environment variables.

use std::time::Duration;

use crate::capture::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::collector::DEFAULT_TTL;
use crate::errors::TrustError;

#[derive(Clone, Debug)]
pub struct TrustConfig {
    /// How long a captured chain is reused. Zero disables the cache.
    pub ttl: Duration,
    pub handshake_timeout: Duration,
    /// Handshakes in flight at once.
    pub concurrency: usize,
}

impl TrustConfig {
    pub fn new_default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            concurrency: 4,
        }
    }

    /// `KUSTOMAP_CA_TTL_SECS`, `KUSTOMAP_HANDSHAKE_TIMEOUT_SECS`,
    /// `KUSTOMAP_HANDSHAKE_CONCURRENCY`.
    pub fn from_env() -> Self {
        let dflt = Self::new_default();
        Self {
            ttl: Duration::from_secs(parse("KUSTOMAP_CA_TTL_SECS", dflt.ttl.as_secs())),
            handshake_timeout: Duration::from_secs(parse(
                "KUSTOMAP_HANDSHAKE_TIMEOUT_SECS",
                dflt.handshake_timeout.as_secs(),
            )),
            concurrency: parse("KUSTOMAP_HANDSHAKE_CONCURRENCY", dflt.concurrency),
        }
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        if self.handshake_timeout.is_zero() {
            return Err(TrustError::Config("handshake timeout must be > 0".into()));
        }
        if self.concurrency == 0 {
            return Err(TrustError::Config("concurrency must be > 0".into()));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(dflt)
}
