//! Repository snapshot downloads for GitHub and GitLab.
//!
//! The crate answers one question: given a provider, base URL, owner, repo
//! and ref, where on disk is the gzipped tarball of that tree? Callers that
//! only need the capability depend on [`RepositoryFetcher`]; [`ArchiveClient`]
//! is the HTTP implementation.

pub mod config;
mod download;
mod errors;
pub mod git_providers;

use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, info};

pub use config::FetchConfig;
pub use download::archive_path;
pub use errors::{ConfigError, FetchError, FetchResult, ProviderError};
pub use git_providers::{ArchiveRequest, ProviderClient, ProviderKind};

/// Anything able to turn an [`ArchiveRequest`] into a local `.tar.gz` path.
///
/// Implementations may download, read a local mirror or go through a proxy.
pub trait RepositoryFetcher: Send + Sync {
    fn fetch_archive(
        &self,
        request: &ArchiveRequest,
    ) -> impl Future<Output = FetchResult<PathBuf>> + Send;
}

/// HTTP-backed fetcher sharing one `reqwest::Client` across providers.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    http: reqwest::Client,
    cfg: FetchConfig,
}

impl ArchiveClient {
    /// Builds the shared HTTP client from configuration.
    ///
    /// Extra PEM roots are added on top of the built-in trust roots, so hosts
    /// with private CAs become reachable without touching the system store.
    pub fn from_config(cfg: FetchConfig) -> FetchResult<Self> {
        cfg.validate()?;

        let mut builder = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout);

        if let Some(pem) = &cfg.extra_ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| ConfigError::InvalidCaBundle(e.to_string()))?;
            debug!("adding {} extra root certificate(s)", certs.len());
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.cfg
    }
}

impl RepositoryFetcher for ArchiveClient {
    async fn fetch_archive(&self, request: &ArchiveRequest) -> FetchResult<PathBuf> {
        if request.owner.is_empty() || request.repo.is_empty() || request.git_ref.is_empty() {
            return Err(FetchError::Validation(format!(
                "incomplete request for {}@{}",
                request.project(),
                request.git_ref
            )));
        }

        let dest = archive_path(&self.cfg.work_dir, request);
        let client =
            ProviderClient::for_request(&self.http, request, self.cfg.token_for(request.kind))?;
        let bytes = client.download_archive(request, &dest).await?;

        info!(
            provider = %request.kind,
            project = %request.project(),
            git_ref = %request.git_ref,
            bytes,
            "archive downloaded"
        );
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incomplete_request_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let client = ArchiveClient::from_config(FetchConfig::new_default(dir.path())).unwrap();
        let req = ArchiveRequest {
            kind: ProviderKind::GitHub,
            base_url: "https://github.com".into(),
            owner: "foo".into(),
            repo: "".into(),
            path: "".into(),
            git_ref: "main".into(),
        };
        let err = client.fetch_archive(&req).await.unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
        assert!(!dir.path().join("archives").exists());
    }
}
