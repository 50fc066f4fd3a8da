//! Kustomize base/overlay dependency graphs across Git repositories.
//!
//! A build starts from one node id (`github:owner/repo/path@ref`), downloads
//! the repository snapshot through a [`RepositoryFetcher`], reads the
//! kustomization in the node directory and follows every `resources`,
//! `bases` and `components` entry that points at another kustomization,
//! local or remote.
//!
//! [`RepositoryFetcher`]: git_archive_fetch::RepositoryFetcher

pub mod builder;
pub mod config;
pub mod errors;
pub mod extract;
pub mod graph;
pub mod node_id;
pub mod reference;
pub mod scanner;

#[cfg(test)]
mod test_support;

pub use builder::{BuildOutcome, GraphBuilder};
pub use config::BuildConfig;
pub use errors::{
    BuildError, BuildResult, ExtractError, NodeError, NodeFailure, ParseError, ReferenceError,
    ScanError,
};
pub use extract::extract_tar_gz;
pub use graph::{Edge, Graph, NodeMetadata, NodeRole, NodeState};
pub use node_id::NodeIdentifier;
pub use reference::{ChildRef, resolve_local, resolve_reference};
pub use scanner::{KustomizationScanner, ManifestReference, ReferenceKind, ReferenceScanner};
