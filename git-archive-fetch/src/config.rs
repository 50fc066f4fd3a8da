//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::git_providers::ProviderKind;

/// Config bag for archive downloads. All fields have defaults via `from_env`.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Root for downloaded archives (`<work_dir>/archives`).
    pub work_dir: PathBuf,
    /// Token for GitHub / GitHub Enterprise.
    pub github_token: Option<String>,
    /// Token for GitLab instances.
    pub gitlab_token: Option<String>,
    /// Whole-request timeout for a single download.
    pub timeout: Duration,
    /// Extra PEM roots trusted by the HTTP client in addition to its defaults.
    pub extra_ca_pem: Option<String>,
    pub user_agent: String,
}

impl FetchConfig {
    /// Creates a config with no tokens rooted at `work_dir`.
    pub fn new_default(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            github_token: None,
            gitlab_token: None,
            timeout: Duration::from_secs(60),
            extra_ca_pem: None,
            user_agent: format!("kustomap/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Build from environment variables with sensible defaults.
    ///
    /// `KUSTOMAP_CA_BUNDLE` names a PEM file; reading it may fail.
    pub fn from_env() -> Result<Self, ConfigError> {
        let work_dir = std::env::var("KUSTOMAP_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("kustomap"));

        let extra_ca_pem = match non_empty("KUSTOMAP_CA_BUNDLE") {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::InvalidCaBundle(format!("{path}: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            github_token: non_empty("GITHUB_TOKEN"),
            gitlab_token: non_empty("GITLAB_TOKEN"),
            timeout: Duration::from_secs(parse("KUSTOMAP_HTTP_TIMEOUT_SECS", 60u64)),
            extra_ca_pem,
            ..Self::new_default(work_dir)
        })
    }

    /// Returns a copy trusting the given PEM bundle in addition to the defaults.
    pub fn with_ca_bundle(mut self, pem: impl Into<String>) -> Self {
        let pem = pem.into();
        self.extra_ca_pem = if pem.trim().is_empty() { None } else { Some(pem) };
        self
    }

    /// Token configured for the given provider, if any.
    pub fn token_for(&self, kind: ProviderKind) -> Option<String> {
        match kind {
            ProviderKind::GitHub => self.github_token.clone(),
            ProviderKind::GitLab => self.gitlab_token.clone(),
        }
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(ConfigError::Client("work_dir is empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Client("timeout must be > 0".into()));
        }
        Ok(())
    }
}

fn non_empty(k: &str) -> Option<String> {
    std::env::var(k).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(dflt)
}
