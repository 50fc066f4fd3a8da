//! GitLab provider (REST v4) for repository archives.
//!
//! Endpoint used:
//!   * GET /projects/:id/repository/archive.tar.gz?sha=:ref
//!
//! Every GitLab instance (public or self-hosted) serves the API from the same
//! host as its web UI.

use std::path::Path;

use reqwest::Client;
use tracing::debug;

use crate::download::{check_status, stream_to_file};
use crate::errors::FetchResult;
use crate::git_providers::types::ArchiveRequest;

/// GitLab HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String,      // e.g. "https://gitlab.com/api/v4"
    token: Option<String>, // "PRIVATE-TOKEN"
}

impl GitLabClient {
    /// Constructs a GitLab client for the instance rooted at `base_url`.
    pub fn new(http: Client, base_url: &str, token: Option<String>) -> Self {
        let base_api = format!("{}/api/v4", base_url.trim_end_matches('/'));
        debug!("Creating GitLabClient with base_api={}", base_api);
        Self {
            http,
            base_api,
            token,
        }
    }

    /// Archive URL without the ref query parameter.
    pub fn archive_url(&self, req: &ArchiveRequest) -> String {
        format!(
            "{}/projects/{}/repository/archive.tar.gz",
            self.base_api,
            urlencoding::encode(&req.project()),
        )
    }

    /// Downloads the snapshot archive into `dest`.
    pub async fn download_archive(&self, req: &ArchiveRequest, dest: &Path) -> FetchResult<u64> {
        let url = self.archive_url(req);
        debug!("GitLab download_archive: {} sha={}", url, req.git_ref);

        let mut builder = self.http.get(url).query(&[("sha", req.git_ref.as_str())]);
        if let Some(token) = &self.token {
            builder = builder.header("PRIVATE-TOKEN", token);
        }

        let resp = check_status(builder.send().await?)?;
        stream_to_file(resp, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::types::ProviderKind;

    #[test]
    fn archive_url_encodes_project_path() {
        let client = GitLabClient::new(Client::new(), "https://gitlab.example.com/", None);
        let req = ArchiveRequest {
            kind: ProviderKind::GitLab,
            base_url: "https://gitlab.example.com".into(),
            owner: "owner".into(),
            repo: "repo".into(),
            path: "env/overlay".into(),
            git_ref: "components/new-base".into(),
        };
        assert_eq!(
            client.archive_url(&req),
            "https://gitlab.example.com/api/v4/projects/owner%2Frepo/repository/archive.tar.gz"
        );
    }
}
