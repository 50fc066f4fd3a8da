//! Translation of raw manifest references into child node identifiers.
//!
//! Supported shapes:
//!   * node ids: `github:acme/shared/base@v1`
//!   * kustomize remote targets:
//!       `https://github.com/acme/shared//base?ref=v1`
//!       `https://gitlab.example.com/team/app.git//overlays/prod?ref=main`
//!       `github.com/acme/shared/base?ref=v1` (scheme-less: only for
//!       github.com, gitlab.com and the parent's own host)
//!       `git@gitlab.example.com:team/app.git//base?ref=main`
//!       `https://github.com/acme/shared/tree/main/base`
//!   * local directories relative to the parent: `../base`, `components/x`
//!
//! A reference the scanner found as an existing directory next to the
//! manifest goes through [`resolve_local`] and is never treated as remote.

use git_archive_fetch::ProviderKind;
use url::Url;

use crate::errors::ReferenceError;
use crate::node_id::NodeIdentifier;

/// Ref used for remote targets that do not pin one (the default branch).
pub const DEFAULT_REMOTE_REF: &str = "HEAD";

/// A resolved child together with the base URL it must be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub id: NodeIdentifier,
    pub base_url: String,
}

/// Resolves `raw` as seen from `parent` (served from `parent_base_url`).
///
/// `Ok(None)` means the reference is not a graph node (blank entry).
pub fn resolve_reference(
    parent: &NodeIdentifier,
    parent_base_url: &str,
    raw: &str,
) -> Result<Option<ChildRef>, ReferenceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if looks_like_node_id(raw) {
        let id = NodeIdentifier::parse(raw).map_err(|source| ReferenceError::Parse {
            raw: raw.to_string(),
            source,
        })?;
        let base_url = if id.provider == parent.provider {
            parent_base_url.to_string()
        } else {
            id.provider.default_base_url().to_string()
        };
        return Ok(Some(ChildRef { id, base_url }));
    }

    if looks_remote(parent_base_url, raw) {
        return resolve_remote(parent, parent_base_url, raw).map(Some);
    }

    resolve_local(parent, parent_base_url, raw)
}

/// Resolves `raw` as a directory inside the parent's snapshot.
pub fn resolve_local(
    parent: &NodeIdentifier,
    parent_base_url: &str,
    raw: &str,
) -> Result<Option<ChildRef>, ReferenceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let path = join_relative(&parent.path, raw)
        .ok_or_else(|| ReferenceError::EscapesRoot(raw.to_string()))?;
    Ok(Some(ChildRef {
        id: parent.with_path(path),
        base_url: parent_base_url.to_string(),
    }))
}

fn looks_like_node_id(raw: &str) -> bool {
    match raw.split_once(':') {
        Some((prefix, rest)) => {
            ProviderKind::from_prefix(prefix).is_some() && !rest.starts_with("//")
        }
        None => false,
    }
}

/// Scheme URLs, scp-style ssh, or `host/owner/repo...` without a scheme when
/// `host` is a public provider or the parent's own host. Any other dotted
/// first segment (`conf.d/base`, `v1.2/overlays`) is a local directory.
fn looks_remote(parent_base_url: &str, raw: &str) -> bool {
    if raw.contains("://") || raw.starts_with("git@") || raw.starts_with("git::") {
        return true;
    }
    let mut segments = raw.split('/');
    let host = segments.next().unwrap_or_default();
    let known = ["github.com", "www.github.com", "gitlab.com"]
        .iter()
        .any(|h| host.eq_ignore_ascii_case(h))
        || same_authority(parent_base_url, host);
    known && segments.filter(|s| !s.is_empty()).count() >= 2
}

fn resolve_remote(
    parent: &NodeIdentifier,
    parent_base_url: &str,
    raw: &str,
) -> Result<ChildRef, ReferenceError> {
    let invalid = |reason: &str| ReferenceError::Invalid {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(&normalize_remote(raw)).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let authority = match url.port() {
        Some(port) if url.scheme() != "ssh" => format!("{host}:{port}"),
        _ => host.to_string(),
    };

    let mut git_ref = url
        .query_pairs()
        .find(|(k, _)| k == "ref" || k == "version")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty());

    let (owner, repo, path) = match url.path().split_once("//") {
        Some((repo_part, sub_path)) => {
            let segments: Vec<&str> = repo_part.split('/').filter(|s| !s.is_empty()).collect();
            match segments.as_slice() {
                [owner, repo] => (owner.to_string(), repo.to_string(), sub_path.to_string()),
                [_, _, _, ..] => return Err(invalid("nested namespaces are not supported")),
                _ => return Err(invalid("expected owner/repo")),
            }
        }
        None => {
            let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
            if segments.len() < 2 {
                return Err(invalid("expected owner/repo"));
            }
            let mut rest = &segments[2..];
            // Web UI links: .../tree/<ref>/<path> (GitHub) or .../-/tree/<ref>/<path> (GitLab)
            if rest.first() == Some(&"-") {
                rest = &rest[1..];
            }
            if let [marker, web_ref, tail @ ..] = rest {
                if *marker == "tree" || *marker == "blob" {
                    git_ref.get_or_insert_with(|| web_ref.to_string());
                    rest = tail;
                }
            }
            (segments[0].to_string(), segments[1].to_string(), rest.join("/"))
        }
    };

    let repo = repo.strip_suffix(".git").unwrap_or(&repo).to_string();
    if owner.is_empty() || repo.is_empty() {
        return Err(invalid("expected owner/repo"));
    }

    let (provider, base_url) = if same_authority(parent_base_url, &authority) {
        (parent.provider, parent_base_url.to_string())
    } else if host == "github.com" || host == "www.github.com" {
        (
            ProviderKind::GitHub,
            ProviderKind::GitHub.default_base_url().to_string(),
        )
    } else {
        (ProviderKind::GitLab, format!("https://{authority}"))
    };

    Ok(ChildRef {
        id: NodeIdentifier {
            provider,
            owner,
            repo,
            path: path.trim_matches('/').to_string(),
            git_ref: git_ref.unwrap_or_else(|| DEFAULT_REMOTE_REF.to_string()),
        },
        base_url,
    })
}

/// Brings every remote shape to something `Url` parses.
fn normalize_remote(raw: &str) -> String {
    let raw = raw.strip_prefix("git::").unwrap_or(raw);
    if raw.contains("://") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix("git@") {
        // scp-like: git@host:owner/repo.git//path
        return match rest.split_once(':') {
            Some((host, path)) => format!("ssh://git@{host}/{path}"),
            None => format!("ssh://git@{rest}"),
        };
    }
    format!("https://{raw}")
}

fn same_authority(base_url: &str, authority: &str) -> bool {
    Url::parse(base_url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(match u.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .is_some_and(|base| base.eq_ignore_ascii_case(authority))
}

/// Resolves `relative` against `base` inside the repository.
///
/// Returns `None` when `..` climbs above the repository root.
pub fn join_relative(base: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> NodeIdentifier {
        NodeIdentifier::parse("github:acme/app/overlays/prod@main").unwrap()
    }

    fn resolve(raw: &str) -> ChildRef {
        resolve_reference(&parent(), "https://github.com", raw)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn local_directories_stay_in_the_snapshot() {
        let child = resolve("../../base");
        assert_eq!(child.id.key(), "github:acme/app/base@main");
        assert_eq!(child.base_url, "https://github.com");

        let child = resolve("./components/cache/");
        assert_eq!(child.id.key(), "github:acme/app/overlays/prod/components/cache@main");
    }

    #[test]
    fn local_escape_is_rejected() {
        let err = resolve_reference(&parent(), "https://github.com", "../../../outside").unwrap_err();
        assert_eq!(err, ReferenceError::EscapesRoot("../../../outside".into()));
    }

    #[test]
    fn node_id_references() {
        let child = resolve("github:acme/shared/base@v1");
        assert_eq!(child.id.key(), "github:acme/shared/base@v1");
        assert_eq!(child.base_url, "https://github.com");

        let child = resolve("gitlab:team/infra@main");
        assert_eq!(child.base_url, "https://gitlab.com");

        assert!(matches!(
            resolve_reference(&parent(), "https://github.com", "github:acme@main"),
            Err(ReferenceError::Parse { .. })
        ));
    }

    #[test]
    fn github_remote_targets() {
        let child = resolve("https://github.com/acme/shared//components/logging?ref=v1");
        assert_eq!(child.id.key(), "github:acme/shared/components/logging@v1");
        assert_eq!(child.base_url, "https://github.com");

        let child = resolve("github.com/acme/shared/base?ref=release/2.0");
        assert_eq!(child.id.key(), "github:acme/shared/base@release/2.0");

        let child = resolve("https://github.com/acme/shared.git");
        assert_eq!(child.id.key(), "github:acme/shared@HEAD");

        let child = resolve("https://github.com/acme/shared/tree/main/base");
        assert_eq!(child.id.key(), "github:acme/shared/base@main");
    }

    #[test]
    fn self_hosted_targets_become_gitlab() {
        let child = resolve("https://gitlab.example.com/team/app.git//overlays/prod?ref=main&ref_type=heads");
        assert_eq!(child.id.key(), "gitlab:team/app/overlays/prod@main");
        assert_eq!(child.base_url, "https://gitlab.example.com");

        let child = resolve("git@gitlab.example.com:team/app.git//base?version=v2");
        assert_eq!(child.id.key(), "gitlab:team/app/base@v2");
        assert_eq!(child.base_url, "https://gitlab.example.com");

        let child = resolve("https://gitlab.example.com:8443/team/app/-/tree/dev/env");
        assert_eq!(child.id.key(), "gitlab:team/app/env@dev");
        assert_eq!(child.base_url, "https://gitlab.example.com:8443");
    }

    #[test]
    fn same_host_inherits_parent_provider_and_base() {
        let ghe = NodeIdentifier::parse("github:corp/platform@main").unwrap();
        let child = resolve_reference(
            &ghe,
            "https://ghe.corp.example",
            "https://ghe.corp.example/corp/base//k8s?ref=v3",
        )
        .unwrap()
        .unwrap();
        assert_eq!(child.id.key(), "github:corp/base/k8s@v3");
        assert_eq!(child.base_url, "https://ghe.corp.example");
    }

    #[test]
    fn nested_namespaces_are_rejected() {
        let err = resolve_reference(
            &parent(),
            "https://github.com",
            "https://gitlab.example.com/group/sub/app.git//base?ref=main",
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::Invalid { .. }));
    }

    #[test]
    fn dotted_local_directories_stay_local() {
        let child = resolve("conf.d/base/v1");
        assert_eq!(child.id.key(), "github:acme/app/overlays/prod/conf.d/base/v1@main");
        assert_eq!(child.base_url, "https://github.com");

        let child = resolve("../v1.2/overlays/prod");
        assert_eq!(child.id.key(), "github:acme/app/overlays/v1.2/overlays/prod@main");
    }

    #[test]
    fn scheme_less_targets_on_the_parent_host() {
        let gl = NodeIdentifier::parse("gitlab:team/app@main").unwrap();
        let child = resolve_reference(
            &gl,
            "https://gitlab.example.com",
            "gitlab.example.com/team/infra//base?ref=v2",
        )
        .unwrap()
        .unwrap();
        assert_eq!(child.id.key(), "gitlab:team/infra/base@v2");
        assert_eq!(child.base_url, "https://gitlab.example.com");

        let child = resolve("gitlab.com/team/infra//base");
        assert_eq!(child.id.key(), "gitlab:team/infra/base@HEAD");
        assert_eq!(child.base_url, "https://gitlab.com");
    }

    #[test]
    fn existing_directories_resolve_locally_even_if_host_shaped() {
        let child = resolve_local(&parent(), "https://github.com", "github.com/acme/shared")
            .unwrap()
            .unwrap();
        assert_eq!(child.id.key(), "github:acme/app/overlays/prod/github.com/acme/shared@main");

        assert_eq!(resolve_local(&parent(), "https://github.com", " ").unwrap(), None);
        assert!(matches!(
            resolve_local(&parent(), "https://github.com", "../../../x"),
            Err(ReferenceError::EscapesRoot(_))
        ));
    }

    #[test]
    fn blank_reference_is_ignored() {
        assert_eq!(resolve_reference(&parent(), "https://github.com", "  ").unwrap(), None);
    }

    #[test]
    fn join_relative_cases() {
        assert_eq!(join_relative("", "base").as_deref(), Some("base"));
        assert_eq!(join_relative("a/b", "../c").as_deref(), Some("a/c"));
        assert_eq!(join_relative("a", "..").as_deref(), Some(""));
        assert_eq!(join_relative("a", "../.."), None);
    }
}
