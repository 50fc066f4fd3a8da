//! Builder settings loaded from environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::BuildError;

#[derive(Clone, Debug)]
pub struct BuildConfig {
    /// Where snapshots are unpacked, one subdirectory per snapshot.
    pub extract_dir: PathBuf,
    /// Node resolutions in flight per frontier.
    pub concurrency: usize,
    /// Frontier depth after which children are recorded but not visited.
    pub max_depth: Option<usize>,
    /// Upper bound for a whole build.
    pub deadline: Option<Duration>,
}

impl BuildConfig {
    pub fn new_default(work_dir: &Path) -> Self {
        Self {
            extract_dir: work_dir.join("trees"),
            concurrency: 4,
            max_depth: None,
            deadline: None,
        }
    }

    /// `KUSTOMAP_EXTRACT_DIR`, `KUSTOMAP_CONCURRENCY`, `KUSTOMAP_MAX_DEPTH`,
    /// `KUSTOMAP_BUILD_DEADLINE_SECS`.
    pub fn from_env(work_dir: &Path) -> Self {
        let dflt = Self::new_default(work_dir);
        Self {
            extract_dir: env("KUSTOMAP_EXTRACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(dflt.extract_dir),
            concurrency: parse("KUSTOMAP_CONCURRENCY", dflt.concurrency),
            max_depth: env("KUSTOMAP_MAX_DEPTH").and_then(|v| v.parse().ok()),
            deadline: env("KUSTOMAP_BUILD_DEADLINE_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.concurrency == 0 {
            return Err(BuildError::Config("concurrency must be > 0".into()));
        }
        if self.extract_dir.as_os_str().is_empty() {
            return Err(BuildError::Config("extract_dir is empty".into()));
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(BuildError::Config("deadline must be > 0".into()));
        }
        Ok(())
    }
}

fn env(k: &str) -> Option<String> {
    std::env::var(k).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    env(k).and_then(|v| v.parse().ok()).unwrap_or(dflt)
}
