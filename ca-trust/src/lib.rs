//! TLS trust bootstrap for the hosts of an overlay graph.
//!
//! [`Collector`] resolves every base URL of a [`Graph`](overlay_graph::Graph)
//! to the host serving the provider API, captures the chain each host
//! presents and attaches a deduplicated PEM bundle to the graph. The bundle
//! can then be used as the only trust store for further calls to those hosts.

mod bundle;
mod cache;
mod capture;
mod cert;
mod collector;
pub mod config;
mod errors;
pub mod host;

pub use bundle::TrustBundle;
pub use cache::ChainCache;
pub use capture::{ChainSource, DEFAULT_HANDSHAKE_TIMEOUT, HTTPS_PORT, TlsChainSource};
pub use cert::{Certificate, fingerprint};
pub use collector::{Collector, DEFAULT_TTL, unique_hosts};
pub use config::TrustConfig;
pub use errors::{HandshakeError, TrustError, TrustResult};
pub use host::{GITHUB_API_HOST, resolve_tls_host};
