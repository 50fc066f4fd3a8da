//! Provider-agnostic request model for repository snapshots.

use serde::{Deserialize, Serialize};

/// Supported Git providers.
///
/// The set is closed: adding a provider means adding a variant here plus its
/// prefix and default base URL mappings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    /// Identifier prefix used in canonical node ids (`github:`/`gitlab:`).
    pub fn prefix(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        }
    }

    /// Reverse of [`ProviderKind::prefix`]. Unknown prefixes yield `None`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "github" => Some(ProviderKind::GitHub),
            "gitlab" => Some(ProviderKind::GitLab),
            _ => None,
        }
    }

    /// Public web endpoint used when no explicit base URL is supplied.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "https://github.com",
            ProviderKind::GitLab => "https://gitlab.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A single snapshot download request.
///
/// * `base_url` – web root of the provider instance, e.g. `https://github.com`
///   or `https://gitlab.example.com`.
/// * `path` – subdirectory the caller is interested in. Providers always
///   return the whole tree; the path is carried for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub kind: ProviderKind,
    pub base_url: String,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub git_ref: String,
}

impl ArchiveRequest {
    /// "owner/repo" as used by both provider APIs.
    pub fn project(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Identity of the snapshot, independent of the requested subpath.
    pub fn snapshot_key(&self) -> String {
        format!(
            "{}:{}:{}/{}@{}",
            self.kind.prefix(),
            self.base_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.git_ref
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_round_trip() {
        for kind in [ProviderKind::GitHub, ProviderKind::GitLab] {
            assert_eq!(ProviderKind::from_prefix(kind.prefix()), Some(kind));
        }
        assert_eq!(ProviderKind::from_prefix("bitbucket"), None);
        assert_eq!(ProviderKind::from_prefix("GitHub"), None);
    }

    #[test]
    fn snapshot_key_ignores_path_and_trailing_slash() {
        let a = ArchiveRequest {
            kind: ProviderKind::GitLab,
            base_url: "https://gitlab.example.com/".into(),
            owner: "team".into(),
            repo: "deploy".into(),
            path: "overlays/prod".into(),
            git_ref: "main".into(),
        };
        let b = ArchiveRequest {
            base_url: "https://gitlab.example.com".into(),
            path: "base".into(),
            ..a.clone()
        };
        assert_eq!(a.snapshot_key(), b.snapshot_key());
        assert_eq!(
            a.snapshot_key(),
            "gitlab:https://gitlab.example.com:team/deploy@main"
        );
    }
}
