//! Crate-wide error hierarchy for overlay-graph.
//!
//! Only [`BuildError`] aborts a build. Everything that goes wrong while
//! resolving a single node is a [`NodeError`] collected next to the graph.

use std::path::PathBuf;
use std::time::Duration;

use git_archive_fetch::FetchError;
use thiserror::Error;

/// Convenient alias for build results.
pub type BuildResult<T> = Result<T, BuildError>;

/// Failures that abort the whole build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The starting identifier is malformed.
    #[error("parse node id: {0}")]
    Parse(#[from] ParseError),

    /// The configured deadline elapsed before the frontier was exhausted.
    #[error("build deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Invalid builder configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Node identifier grammar violations. Each variant carries the input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid node id {0:?}: missing or invalid type prefix (expected type:owner/repo[/path]@ref)")]
    MissingType(String),

    #[error("unsupported repository type {prefix:?} in node id {input:?}")]
    UnsupportedType { input: String, prefix: String },

    #[error("invalid node id {0:?}: missing @ref")]
    MissingRef(String),

    #[error("invalid node id {0:?}: empty ref")]
    EmptyRef(String),

    #[error("invalid node id {0:?}: expected owner/repo[/path]")]
    MalformedRepo(String),
}

/// Archive extraction failures. Terminal for the archive in question.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no top-level directory in archive {0}")]
    NoTopLevelDir(PathBuf),

    #[error("archive {archive} has more than one top-level entry ({first}, {second})")]
    MultipleTopLevelDirs {
        archive: PathBuf,
        first: String,
        second: String,
    },

    #[error("archive entry {entry:?} escapes the destination directory")]
    PathTraversal { entry: String },
}

/// Manifest scanning failures.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid kustomization {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A manifest reference that cannot become a graph node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference {raw:?}: {reason}")]
    Invalid { raw: String, reason: String },

    #[error("reference {0:?} escapes the repository root")]
    EscapesRoot(String),

    #[error("reference {raw:?}: {source}")]
    Parse {
        raw: String,
        #[source]
        source: ParseError,
    },
}

/// Why a single node could not be resolved.
#[derive(Debug, Error)]
pub enum NodeFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extract failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("path {0:?} not found in snapshot")]
    PathNotFound(String),

    #[error("path {0:?} is not a plain relative path")]
    InvalidPath(String),

    /// Another node of the same snapshot already failed to materialize it.
    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("workspace io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// Per-node failure reported alongside a (partial) graph.
#[derive(Debug, Error)]
#[error("{node}: {failure}")]
pub struct NodeError {
    /// Canonical id of the node that failed.
    pub node: String,
    #[source]
    pub failure: NodeFailure,
}
