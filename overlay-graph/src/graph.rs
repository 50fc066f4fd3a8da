//! The dependency graph produced by a build.
//!
//! Nodes are keyed by canonical node id. Maps are ordered so that a graph
//! serializes identically no matter in which order workers finished.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::node_id::NodeIdentifier;
use crate::scanner::ReferenceKind;

/// Position of a node in the overlay hierarchy, guessed from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Base,
    Overlay,
    Component,
}

impl NodeRole {
    /// Case-insensitive substring rules, first match wins: base markers
    /// (`/base`, exactly `base`, a trailing `/bases`), then overlay markers
    /// (`/overlay`, `/env`, `prod`, `dev`, `staging`), then `/component`.
    /// Anything else is a base.
    pub fn infer(path: &str) -> Self {
        let path = path.to_lowercase();
        if path.contains("/base") || path == "base" || path.ends_with("/bases") {
            NodeRole::Base
        } else if ["/overlay", "/env", "prod", "dev", "staging"]
            .iter()
            .any(|marker| path.contains(marker))
        {
            NodeRole::Overlay
        } else if path.contains("/component") {
            NodeRole::Component
        } else {
            NodeRole::Base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeState {
    /// Discovered but not visited (depth limit or aborted build).
    #[default]
    Pending,
    Resolved,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub id: NodeIdentifier,
    pub role: NodeRole,
    #[serde(flatten)]
    pub state: NodeState,
}

/// `from` includes `to` through a `resources`/`bases` or `components` entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: BTreeMap<String, NodeMetadata>,
    pub edges: BTreeSet<Edge>,
    /// Base URL every visited node was fetched from.
    pub base_urls: BTreeMap<String, String>,
    /// PEM bundle of CA chains for the hosts above, empty until collected.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_bundle: String,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` as a pending node. Returns `false` if it was already known.
    pub fn add_node(&mut self, id: NodeIdentifier, role: NodeRole) -> bool {
        let key = id.key();
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(
            key,
            NodeMetadata {
                id,
                role,
                state: NodeState::Pending,
            },
        );
        true
    }

    /// Adds `from -> to`. Both ends must exist; a second edge between the
    /// same pair is ignored whatever its kind. Returns whether it was added.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: ReferenceKind) -> bool {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return false;
        }
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return false;
        }
        self.edges.insert(Edge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        })
    }

    pub fn set_state(&mut self, key: &str, state: NodeState) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.state = state;
        }
    }

    pub fn record_base_url(&mut self, key: &str, base_url: &str) {
        self.base_urls
            .insert(key.to_string(), base_url.trim_end_matches('/').to_string());
    }

    pub fn node(&self, key: &str) -> Option<&NodeMetadata> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of `key`, sorted.
    pub fn children(&self, key: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == key)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Nodes nothing else depends on.
    pub fn roots(&self) -> Vec<&str> {
        let targets: BTreeSet<&str> = self.edges.iter().map(|e| e.to.as_str()).collect();
        self.nodes
            .keys()
            .map(String::as_str)
            .filter(|k| !targets.contains(k))
            .collect()
    }

    /// Every cycle found by a depth-first walk, each reported once as the
    /// path from the re-entered node back to itself.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in &self.edges {
            adjacency.entry(e.from.as_str()).or_default().push(e.to.as_str());
        }

        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();
        let mut found = Vec::new();
        for start in self.nodes.keys() {
            if !visited.contains(start.as_str()) {
                walk(start, &adjacency, &mut visited, &mut stack, &mut found);
            }
        }
        found
    }
}

fn walk<'a>(
    node: &'a str,
    adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut BTreeSet<&'a str>,
    stack: &mut Vec<&'a str>,
    found: &mut Vec<Vec<String>>,
) {
    visited.insert(node);
    stack.push(node);
    for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
        if let Some(pos) = stack.iter().position(|n| *n == next) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            found.push(cycle);
        } else if !visited.contains(next) {
            walk(next, adjacency, visited, stack, found);
        }
    }
    stack.pop();
}
