//! Locates references to other kustomizations inside an extracted directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ScanError;

/// File names kustomize accepts, in lookup order.
pub const KUSTOMIZATION_FILES: [&str; 3] = ["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// How the parent pulls the child in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// `resources:` or the deprecated `bases:`.
    Resource,
    /// `components:`.
    Component,
}

/// One raw reference as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestReference {
    pub raw: String,
    pub kind: ReferenceKind,
    /// `raw` names an existing directory next to the manifest.
    pub local: bool,
}

/// Extracts child references from a node directory.
pub trait ReferenceScanner: Send + Sync {
    fn scan(&self, dir: &Path) -> Result<Vec<ManifestReference>, ScanError>;
}

/// Reads `resources`, `bases` and `components` from the kustomization file.
#[derive(Debug, Clone, Copy, Default)]
pub struct KustomizationScanner;

#[derive(Debug, Default, Deserialize)]
struct KustomizationFile {
    #[serde(default)]
    resources: Option<Vec<String>>,
    #[serde(default)]
    bases: Option<Vec<String>>,
    #[serde(default)]
    components: Option<Vec<String>>,
}

impl KustomizationScanner {
    /// Path of the kustomization file in `dir`, if there is one.
    pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
        KUSTOMIZATION_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }
}

impl ReferenceScanner for KustomizationScanner {
    fn scan(&self, dir: &Path) -> Result<Vec<ManifestReference>, ScanError> {
        let Some(path) = Self::find_manifest(dir) else {
            debug!("no kustomization in {}", dir.display());
            return Ok(Vec::new());
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;
        let yaml_err = |source| ScanError::Yaml {
            path: path.clone(),
            source,
        };
        let value: serde_yaml::Value = serde_yaml::from_str(&text).map_err(yaml_err)?;
        let file: KustomizationFile = if value.is_null() {
            KustomizationFile::default()
        } else {
            serde_yaml::from_value(value).map_err(yaml_err)?
        };

        let entries = file
            .resources
            .unwrap_or_default()
            .into_iter()
            .chain(file.bases.unwrap_or_default())
            .map(|raw| (raw, ReferenceKind::Resource))
            .chain(
                file.components
                    .unwrap_or_default()
                    .into_iter()
                    .map(|raw| (raw, ReferenceKind::Component)),
            );

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (raw, kind) in entries {
            let raw = raw.trim().to_string();
            if raw.is_empty() || is_plain_manifest(&raw) || is_local_file(dir, &raw) {
                continue;
            }
            if seen.insert((raw.clone(), kind)) {
                let local = is_local_dir(dir, &raw);
                out.push(ManifestReference { raw, kind, local });
            }
        }

        debug!("{}: {} reference(s)", path.display(), out.len());
        Ok(out)
    }
}

/// A plain resource manifest rather than another kustomization.
fn is_plain_manifest(raw: &str) -> bool {
    let lower = raw.split('?').next().unwrap_or(raw).to_ascii_lowercase();
    (lower.ends_with(".yaml") || lower.ends_with(".yml"))
        && !lower.ends_with("kustomization.yaml")
        && !lower.ends_with("kustomization.yml")
}

fn is_local_file(dir: &Path, raw: &str) -> bool {
    !raw.contains("://") && dir.join(raw).is_file()
}

fn is_local_dir(dir: &Path, raw: &str) -> bool {
    !raw.contains("://") && !raw.contains('?') && dir.join(raw).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_text(file_name: &str, text: &str) -> Vec<ManifestReference> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(file_name), text).unwrap();
        std::fs::write(dir.path().join("patch.json"), "{}").unwrap();
        KustomizationScanner.scan(dir.path()).unwrap()
    }

    fn raws(refs: &[ManifestReference]) -> Vec<(&str, ReferenceKind)> {
        refs.iter().map(|r| (r.raw.as_str(), r.kind)).collect()
    }

    #[test]
    fn collects_resources_bases_and_components() {
        let refs = scan_text(
            "kustomization.yaml",
            r#"
apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
resources:
  - ../../base
  - deployment.yaml
  - https://github.com/acme/shared//base?ref=v1
bases:
  - ../legacy
components:
  - ../../components/logging
patches:
  - path: patch.json
"#,
        );
        assert_eq!(
            raws(&refs),
            vec![
                ("../../base", ReferenceKind::Resource),
                ("https://github.com/acme/shared//base?ref=v1", ReferenceKind::Resource),
                ("../legacy", ReferenceKind::Resource),
                ("../../components/logging", ReferenceKind::Component),
            ]
        );
    }

    #[test]
    fn skips_existing_local_files_and_duplicates() {
        let refs = scan_text(
            "kustomization.yml",
            "resources:\n  - patch.json\n  - ../base\n  - ../base\n",
        );
        assert_eq!(raws(&refs), vec![("../base", ReferenceKind::Resource)]);
    }

    #[test]
    fn marks_references_to_existing_directories_as_local() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("conf.d/base/v1")).unwrap();
        std::fs::create_dir_all(dir.path().join("github.com/acme/shared")).unwrap();
        std::fs::write(
            dir.path().join("kustomization.yaml"),
            "resources:\n  - conf.d/base/v1\n  - github.com/acme/shared\n  - github.com/acme/other\n",
        )
        .unwrap();

        let refs = KustomizationScanner.scan(dir.path()).unwrap();
        let local: Vec<(&str, bool)> = refs.iter().map(|r| (r.raw.as_str(), r.local)).collect();
        assert_eq!(
            local,
            vec![
                ("conf.d/base/v1", true),
                ("github.com/acme/shared", true),
                ("github.com/acme/other", false),
            ]
        );
    }

    #[test]
    fn accepts_capitalized_manifest_and_empty_documents() {
        assert!(scan_text("Kustomization", "").is_empty());
        assert!(scan_text("kustomization.yaml", "resources:\n").is_empty());
    }

    #[test]
    fn missing_manifest_is_a_leaf() {
        let dir = tempfile::tempdir().unwrap();
        assert!(KustomizationScanner.scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn invalid_yaml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kustomization.yaml"), "resources: [unclosed").unwrap();
        let err = KustomizationScanner.scan(dir.path()).unwrap_err();
        assert!(matches!(err, ScanError::Yaml { .. }));
        assert!(err.to_string().contains("kustomization.yaml"));
    }

    #[test]
    fn plain_manifest_detection() {
        assert!(is_plain_manifest("service.yaml"));
        assert!(is_plain_manifest("https://raw.example.com/x/deploy.yml?token=1"));
        assert!(!is_plain_manifest("../base/kustomization.yaml"));
        assert!(!is_plain_manifest("../base"));
    }
}
