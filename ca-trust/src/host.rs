//! Base URL → hostname that terminates TLS for the provider API.

use tracing::warn;
use url::{Host, Url};

use crate::errors::{TrustError, TrustResult};

/// API host of the public GitHub instance.
pub const GITHUB_API_HOST: &str = "api.github.com";

/// Maps a provider base URL to the host whose certificate chain matters.
///
/// Public GitHub serves its API from [`GITHUB_API_HOST`]; every other
/// instance (GitLab, GitHub Enterprise) serves it from the web host itself.
/// Scheme, port and path are dropped; handshakes always go to 443, so a
/// non-default port is logged. A URL without a scheme is read as `https://`.
pub fn resolve_tls_host(base_url: &str) -> TrustResult<String> {
    let fail = |reason: &str| TrustError::Resolve {
        url: base_url.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(fail("empty URL"));
    }
    let absolute = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&absolute).map_err(|e| fail(&e.to_string()))?;
    let host = match url.host() {
        Some(Host::Domain(d)) if !d.is_empty() => d.to_ascii_lowercase(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        _ => return Err(fail("missing host")),
    };
    if let Some(port) = url.port() {
        warn!(
            base_url,
            port, "chain is captured on port 443, not the port the provider is served on"
        );
    }

    Ok(match host.as_str() {
        "github.com" | "www.github.com" => GITHUB_API_HOST.to_string(),
        _ => host,
    })
}
