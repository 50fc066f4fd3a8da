//! Canonical node identifiers: `type:owner/repo[/path]@ref`.
//!
//! Examples:
//!   * `github:foo/bar/deploy/overlay@main`
//!   * `gitlab:owner/repo/env/overlay@components/new-base` (ref keeps its `/`)
//!   * `gitlab:org/repo@v1.0` (repository root)

use std::fmt;
use std::str::FromStr;

use git_archive_fetch::{ArchiveRequest, ProviderKind};
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Parsed form of a node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdentifier {
    pub provider: ProviderKind,
    pub owner: String,
    pub repo: String,
    /// Directory inside the repository, no leading/trailing `/`, may be empty.
    pub path: String,
    /// Branch, tag or commit. Never empty.
    pub git_ref: String,
}

impl NodeIdentifier {
    /// Parses a canonical node id.
    ///
    /// The ref is split off at the **last** `@`, so refs may contain `/`;
    /// owner and repo are the first two `/`-separated segments and whatever
    /// follows is the path.
    pub fn parse(id: &str) -> Result<Self, ParseError> {
        let colon = match id.find(':') {
            Some(i) if i > 0 && i < id.len() - 1 => i,
            _ => return Err(ParseError::MissingType(id.to_string())),
        };
        let (prefix, rest) = (&id[..colon], &id[colon + 1..]);

        let provider =
            ProviderKind::from_prefix(prefix).ok_or_else(|| ParseError::UnsupportedType {
                input: id.to_string(),
                prefix: prefix.to_string(),
            })?;

        let at = rest
            .rfind('@')
            .ok_or_else(|| ParseError::MissingRef(id.to_string()))?;
        let (before_ref, git_ref) = (&rest[..at], &rest[at + 1..]);
        if git_ref.is_empty() {
            return Err(ParseError::EmptyRef(id.to_string()));
        }

        let mut parts = before_ref.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return Err(ParseError::MalformedRepo(id.to_string()));
        }
        let path = parts.next().unwrap_or_default().trim_matches('/');

        Ok(Self {
            provider,
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
            git_ref: git_ref.to_string(),
        })
    }

    /// Canonical string used as the graph key.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Same repository snapshot, different directory.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into().trim_matches('/').to_string(),
            ..self.clone()
        }
    }

    /// Download request for this node against `base_url`.
    pub fn archive_request(&self, base_url: &str) -> ArchiveRequest {
        ArchiveRequest {
            kind: self.provider,
            base_url: base_url.to_string(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            path: self.path.clone(),
            git_ref: self.git_ref.clone(),
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.provider.prefix(), self.owner, self.repo)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        write!(f, "@{}", self.git_ref)
    }
}

impl FromStr for NodeIdentifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
