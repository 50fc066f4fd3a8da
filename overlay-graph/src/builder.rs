//! Breadth-first graph construction.
//!
//! Flow per frontier:
//!   1) resolve every node concurrently (bounded): fetch the snapshot, unpack
//!      it once per build, scan `<top>/<path>` for references
//!   2) merge the results in key order on the coordinator, which alone owns
//!      the graph and the visited set
//!   3) children seen for the first time form the next frontier

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use git_archive_fetch::{ArchiveRequest, RepositoryFetcher};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::errors::{BuildError, BuildResult, NodeError, NodeFailure};
use crate::extract::extract_tar_gz;
use crate::graph::{Graph, NodeRole, NodeState};
use crate::node_id::NodeIdentifier;
use crate::reference::{resolve_local, resolve_reference};
use crate::scanner::{KustomizationScanner, ManifestReference, ReferenceKind, ReferenceScanner};

/// Result of a build: the graph plus every node that could not be resolved.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: Graph,
    pub errors: Vec<NodeError>,
}

impl BuildOutcome {
    /// No failed nodes and nothing left pending.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
            && self
                .graph
                .nodes
                .values()
                .all(|n| n.state == NodeState::Resolved)
    }
}

#[derive(Debug, Clone)]
struct Visit {
    id: NodeIdentifier,
    base_url: String,
}

type SnapshotSlot = Arc<OnceCell<Result<PathBuf, String>>>;

/// Unpacked snapshots of the current build, keyed by
/// (provider, base URL, owner, repo, ref).
#[derive(Default)]
struct Snapshots {
    slots: Mutex<HashMap<String, SnapshotSlot>>,
}

impl Snapshots {
    /// Directory holding the snapshot root (`<dest>/<top>`).
    ///
    /// The first caller downloads and extracts and gets the typed failure;
    /// everyone else waiting on the same snapshot sees `SnapshotUnavailable`.
    async fn materialize<F: RepositoryFetcher>(
        &self,
        fetcher: &F,
        extract_dir: &Path,
        request: &ArchiveRequest,
    ) -> Result<PathBuf, NodeFailure> {
        let key = request.snapshot_key();
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut failure = None;
        let outcome = slot
            .get_or_init(|| async {
                match fetch_and_extract(fetcher, extract_dir, request).await {
                    Ok(root) => Ok(root),
                    Err(e) => {
                        let reason = e.to_string();
                        failure = Some(e);
                        Err(reason)
                    }
                }
            })
            .await;

        if let Some(e) = failure {
            return Err(e);
        }
        match outcome {
            Ok(root) => {
                debug!("snapshot {} ready", key);
                Ok(root.clone())
            }
            Err(reason) => Err(NodeFailure::SnapshotUnavailable(reason.clone())),
        }
    }
}

async fn fetch_and_extract<F: RepositoryFetcher>(
    fetcher: &F,
    extract_dir: &Path,
    request: &ArchiveRequest,
) -> Result<PathBuf, NodeFailure> {
    let archive = fetcher.fetch_archive(request).await?;

    let dest = extract_dir.join(snapshot_dir_name(request));
    if tokio::fs::try_exists(&dest).await? {
        tokio::fs::remove_dir_all(&dest).await?;
    }
    tokio::fs::create_dir_all(&dest).await?;

    let top = {
        let dest = dest.clone();
        let archive = archive.clone();
        tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest))
            .await
            .map_err(|e| NodeFailure::Task(e.to_string()))??
    };

    debug!(
        "unpacked {} ({}) into {}/{}",
        request.project(),
        request.git_ref,
        dest.display(),
        top
    );
    Ok(dest.join(top))
}

fn snapshot_dir_name(request: &ArchiveRequest) -> String {
    let digest = format!("{:x}", Sha256::digest(request.snapshot_key().as_bytes()));
    format!("{}-{}", request.kind.prefix(), &digest[..16])
}

/// Joins a node path onto the snapshot root, refusing anything but plain
/// relative segments.
fn node_dir(root: &Path, path: &str) -> Result<PathBuf, NodeFailure> {
    let rel = Path::new(path);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(NodeFailure::InvalidPath(path.to_string()));
    }
    Ok(root.join(rel))
}

/// Builds overlay graphs from a starting node id.
pub struct GraphBuilder<F, S = KustomizationScanner> {
    fetcher: F,
    scanner: Arc<S>,
    config: BuildConfig,
}

impl<F, S> GraphBuilder<F, S>
where
    F: RepositoryFetcher,
    S: ReferenceScanner + 'static,
{
    pub fn new(fetcher: F, scanner: S, config: BuildConfig) -> Self {
        Self {
            fetcher,
            scanner: Arc::new(scanner),
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds the graph reachable from `starting_id`.
    ///
    /// `base_url` selects the provider instance for the starting node; `None`
    /// or blank means the provider's public endpoint. Only a malformed id,
    /// invalid config or an elapsed deadline fail the call. Everything else
    /// ends up in [`BuildOutcome::errors`].
    pub async fn build(&self, starting_id: &str, base_url: Option<&str>) -> BuildResult<BuildOutcome> {
        let start = NodeIdentifier::parse(starting_id)?;
        self.config.validate()?;

        let base_url = base_url
            .map(|b| b.trim().trim_end_matches('/'))
            .filter(|b| !b.is_empty())
            .unwrap_or(start.provider.default_base_url())
            .to_string();

        info!(start = %start, base_url = %base_url, "building overlay graph");
        let run = self.run(start, base_url);
        let outcome = match self.config.deadline {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| BuildError::DeadlineExceeded(limit))?,
            None => run.await,
        };

        info!(
            nodes = outcome.graph.len(),
            edges = outcome.graph.edges.len(),
            failed = outcome.errors.len(),
            "overlay graph built"
        );
        Ok(outcome)
    }

    async fn run(&self, start: NodeIdentifier, base_url: String) -> BuildOutcome {
        let cache = Snapshots::default();
        let mut graph = Graph::new();
        let mut errors = Vec::new();

        let key = start.key();
        graph.add_node(start.clone(), NodeRole::infer(&start.path));
        graph.record_base_url(&key, &base_url);

        let mut frontier = vec![Visit { id: start, base_url }];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            debug!(depth, width = frontier.len(), "resolving frontier");

            let snapshots = &cache;
            let mut results: Vec<(Visit, Result<Vec<ManifestReference>, NodeFailure>)> =
                stream::iter(frontier)
                    .map(|visit| async move {
                        let refs = self.resolve_node(&visit, snapshots).await;
                        (visit, refs)
                    })
                    .buffer_unordered(self.config.concurrency.max(1))
                    .collect()
                    .await;
            results.sort_by(|a, b| a.0.id.cmp(&b.0.id));

            let descend = self.config.max_depth.is_none_or(|max| depth < max);
            let mut next = Vec::new();
            for (visit, result) in results {
                let key = visit.id.key();
                match result {
                    Ok(refs) => {
                        graph.set_state(&key, NodeState::Resolved);
                        for reference in &refs {
                            let Some(child) = link_child(&mut graph, &visit, reference) else {
                                continue;
                            };
                            if descend {
                                graph.record_base_url(&child.id.key(), &child.base_url);
                                next.push(child);
                            }
                        }
                    }
                    Err(failure) => {
                        warn!(node = %key, error = %failure, "node failed");
                        graph.set_state(
                            &key,
                            NodeState::Failed {
                                reason: failure.to_string(),
                            },
                        );
                        errors.push(NodeError { node: key, failure });
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        BuildOutcome { graph, errors }
    }

    async fn resolve_node(
        &self,
        visit: &Visit,
        snapshots: &Snapshots,
    ) -> Result<Vec<ManifestReference>, NodeFailure> {
        let request = visit.id.archive_request(&visit.base_url);
        let root = snapshots
            .materialize(&self.fetcher, &self.config.extract_dir, &request)
            .await?;
        let dir = node_dir(&root, &visit.id.path)?;

        let scanner = Arc::clone(&self.scanner);
        let path = visit.id.path.clone();
        tokio::task::spawn_blocking(move || {
            if !dir.is_dir() {
                return Err(NodeFailure::PathNotFound(path));
            }
            scanner.scan(&dir).map_err(NodeFailure::from)
        })
        .await
        .map_err(|e| NodeFailure::Task(e.to_string()))?
    }
}

/// Adds the child node and the connecting edge. Returns the child only when
/// it was not in the graph before.
fn link_child(graph: &mut Graph, parent: &Visit, reference: &ManifestReference) -> Option<Visit> {
    let resolved = if reference.local {
        resolve_local(&parent.id, &parent.base_url, &reference.raw)
    } else {
        resolve_reference(&parent.id, &parent.base_url, &reference.raw)
    };
    let child = match resolved {
        Ok(Some(child)) => child,
        Ok(None) => return None,
        Err(e) => {
            warn!(node = %parent.id, error = %e, "skipping reference");
            return None;
        }
    };

    let role = match reference.kind {
        ReferenceKind::Component => NodeRole::Component,
        ReferenceKind::Resource => NodeRole::infer(&child.id.path),
    };
    let child_key = child.id.key();
    let claimed = graph.add_node(child.id.clone(), role);
    graph.add_edge(&parent.id.key(), &child_key, reference.kind);

    claimed.then(|| Visit {
        id: child.id,
        base_url: child.base_url,
    })
}
