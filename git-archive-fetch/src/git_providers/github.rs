//! GitHub provider (REST v3) for repository tarballs.
//!
//! Endpoint used:
//!   * GET /repos/{owner}/{repo}/tarball/{ref}
//!
//! The public instance serves its API from `api.github.com`; GitHub Enterprise
//! Server serves it from `<base>/api/v3`.

use std::path::Path;

use reqwest::Client;
use tracing::debug;

use crate::download::{check_status, stream_to_file};
use crate::errors::{ConfigError, FetchResult};
use crate::git_providers::types::ArchiveRequest;

/// API root of the public GitHub instance.
pub const PUBLIC_API: &str = "https://api.github.com";

/// GitHub HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,    // "https://api.github.com" or "https://ghe.corp/api/v3"
    token: Option<String>, // sent as "Bearer <token>"
}

impl GitHubClient {
    /// Constructs a GitHub client for the instance rooted at `base_url`.
    pub fn new(http: Client, base_url: &str, token: Option<String>) -> FetchResult<Self> {
        let base_api = api_base_for(base_url)?;
        debug!("Creating GitHubClient with base_api={}", base_api);
        Ok(Self {
            http,
            base_api,
            token,
        })
    }

    /// Full tarball URL for the request.
    pub fn tarball_url(&self, req: &ArchiveRequest) -> String {
        format!(
            "{}/repos/{}/{}/tarball/{}",
            self.base_api,
            urlencoding::encode(&req.owner),
            urlencoding::encode(&req.repo),
            encode_ref(&req.git_ref)
        )
    }

    /// Downloads the snapshot tarball into `dest`.
    pub async fn download_tarball(&self, req: &ArchiveRequest, dest: &Path) -> FetchResult<u64> {
        let url = self.tarball_url(req);
        debug!("GitHub download_tarball: {}", url);

        let mut builder = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let resp = check_status(builder.send().await?)?;
        stream_to_file(resp, dest).await
    }
}

/// Maps a GitHub web root to its REST API root.
pub fn api_base_for(base_url: &str) -> FetchResult<String> {
    let parsed = url::Url::parse(base_url)
        .map_err(|e| ConfigError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    match parsed.host_str() {
        Some("github.com") | Some("www.github.com") => Ok(PUBLIC_API.to_string()),
        Some(_) => Ok(format!("{}/api/v3", base_url.trim_end_matches('/'))),
        None => Err(ConfigError::InvalidBaseUrl(base_url.to_string()).into()),
    }
}

/// Encodes every ref segment but keeps `/` separators intact.
fn encode_ref(git_ref: &str) -> String {
    git_ref
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_providers::types::ProviderKind;

    fn request(git_ref: &str) -> ArchiveRequest {
        ArchiveRequest {
            kind: ProviderKind::GitHub,
            base_url: "https://github.com".into(),
            owner: "foo".into(),
            repo: "bar".into(),
            path: "deploy/overlay".into(),
            git_ref: git_ref.into(),
        }
    }

    #[test]
    fn public_github_uses_api_host() {
        assert_eq!(api_base_for("https://github.com").unwrap(), PUBLIC_API);
        assert_eq!(api_base_for("https://github.com/").unwrap(), PUBLIC_API);
    }

    #[test]
    fn enterprise_uses_api_v3() {
        assert_eq!(
            api_base_for("https://ghe.example.com/").unwrap(),
            "https://ghe.example.com/api/v3"
        );
        assert!(api_base_for("not a url").is_err());
    }

    #[test]
    fn tarball_url_keeps_ref_slashes() {
        let client = GitHubClient::new(Client::new(), "https://github.com", None).unwrap();
        assert_eq!(
            client.tarball_url(&request("feature/new base")),
            "https://api.github.com/repos/foo/bar/tarball/feature/new%20base"
        );
    }
}
