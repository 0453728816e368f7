//! Per-snapshot centrality cache.
//!
//! Closeness and eigenvector centrality are whole-graph quantities: every
//! community of a snapshot reads the same values. [`SnapshotAnalysis`] owns
//! them next to a borrowed snapshot and computes each at most once, on first
//! use. `OnceLock` gives single-writer memoization, so the analysis can be
//! shared across threads.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::VecDeque;
use std::sync::OnceLock;
use tracing::{debug, warn};

const EIGENVECTOR_MAX_ITER: usize = 100;
const EIGENVECTOR_TOL: f64 = 1e-6;

/// A snapshot plus its lazily computed centralities.
#[derive(Debug)]
pub struct SnapshotAnalysis<'a> {
    snapshot: &'a Snapshot,
    closeness: OnceLock<Vec<f64>>,
    eigenvector: OnceLock<Vec<f64>>,
}

impl<'a> SnapshotAnalysis<'a> {
    /// Wrap a snapshot; nothing is computed yet.
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            closeness: OnceLock::new(),
            eigenvector: OnceLock::new(),
        }
    }

    /// The analysed snapshot.
    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    /// Resolve a node id to its graph index.
    pub fn index_of(&self, id: &str) -> Result<NodeIndex> {
        self.snapshot
            .index_of(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// Closeness centrality of every node, indexed by graph index.
    pub fn closeness(&self) -> &[f64] {
        self.closeness.get_or_init(|| {
            debug!(end_time = %self.snapshot.end_time(), "computing closeness");
            closeness_centrality(self.snapshot)
        })
    }

    /// Eigenvector centrality of every node, indexed by graph index.
    pub fn eigenvector(&self) -> &[f64] {
        self.eigenvector.get_or_init(|| {
            debug!(end_time = %self.snapshot.end_time(), "computing eigenvector centrality");
            eigenvector_centrality(self.snapshot)
        })
    }

    /// Whether closeness has been computed.
    pub fn has_closeness(&self) -> bool {
        self.closeness.get().is_some()
    }
}

/// Hop-distance closeness, normalised by the reachable fraction of the graph.
///
/// ```text
/// C(u) = (r - 1) / Σ d(u, v) · (r - 1) / (N - 1)
/// ```
///
/// where `r` counts the nodes reachable from `u` (including `u`).
pub fn closeness_centrality(snapshot: &Snapshot) -> Vec<f64> {
    let graph = snapshot.graph();
    let n = graph.node_count();
    let mut out = vec![0.0; n];
    if n <= 1 {
        return out;
    }

    let mut dist: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();
    for start in graph.node_indices() {
        dist.iter_mut().for_each(|d| *d = None);
        dist[start.index()] = Some(0);
        queue.clear();
        queue.push_back(start);

        let mut total = 0usize;
        let mut reached = 1usize;
        while let Some(u) = queue.pop_front() {
            let du = dist[u.index()].unwrap_or(0);
            for v in graph.neighbors(u) {
                if dist[v.index()].is_none() {
                    dist[v.index()] = Some(du + 1);
                    total += du + 1;
                    reached += 1;
                    queue.push_back(v);
                }
            }
        }

        if total > 0 {
            let r = (reached - 1) as f64;
            out[start.index()] = (r / total as f64) * (r / (n - 1) as f64);
        }
    }
    out
}

/// Weighted eigenvector centrality by power iteration (L2-normalised).
pub fn eigenvector_centrality(snapshot: &Snapshot) -> Vec<f64> {
    let graph = snapshot.graph();
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..EIGENVECTOR_MAX_ITER {
        let last = x.clone();
        for edge in graph.edge_references() {
            let (a, b, w) = (edge.source().index(), edge.target().index(), *edge.weight());
            x[b] += last[a] * w;
            x[a] += last[b] * w;
        }
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        x.iter_mut().for_each(|v| *v /= norm);

        let delta: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if delta < n as f64 * EIGENVECTOR_TOL {
            return x;
        }
    }
    warn!(
        end_time = %snapshot.end_time(),
        iterations = EIGENVECTOR_MAX_ITER,
        "eigenvector centrality did not converge"
    );
    x
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::{parse_date, NodeKind};

    fn path_graph() -> Snapshot {
        // a - b - c, plus disconnected d - e
        let nodes = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|s| (s.to_string(), NodeKind::Stakeholder));
        let edges = [("a", "b"), ("b", "c"), ("d", "e")]
            .iter()
            .map(|(u, v)| (u.to_string(), v.to_string(), 1.0));
        Snapshot::from_weighted_edges(parse_date("2016-01-01").unwrap(), nodes, edges).unwrap()
    }

    #[test]
    fn test_closeness_path_with_component() {
        let snap = path_graph();
        let c = closeness_centrality(&snap);
        let at = |id: &str| c[snap.index_of(id).unwrap().index()];
        // b reaches 2 nodes at distance 1: (2/2) * (2/4)
        assert!((at("b") - 0.5).abs() < 1e-12);
        // a reaches 2 nodes, total distance 3: (2/3) * (2/4)
        assert!((at("a") - 1.0 / 3.0).abs() < 1e-12);
        // d reaches 1 node: (1/1) * (1/4)
        assert!((at("d") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_analysis_memoizes() {
        let snap = path_graph();
        let analysis = SnapshotAnalysis::new(&snap);
        assert!(!analysis.has_closeness());
        let first = analysis.closeness().as_ptr();
        assert!(analysis.has_closeness());
        assert_eq!(first, analysis.closeness().as_ptr());
    }

    #[test]
    fn test_eigenvector_symmetric_triangle() {
        let nodes = ["a", "b", "c"]
            .iter()
            .map(|s| (s.to_string(), NodeKind::Service));
        let edges = [("a", "b"), ("b", "c"), ("a", "c")]
            .iter()
            .map(|(u, v)| (u.to_string(), v.to_string(), 2.0));
        let snap =
            Snapshot::from_weighted_edges(parse_date("2016-01-01").unwrap(), nodes, edges).unwrap();
        let e = eigenvector_centrality(&snap);
        let expected = 1.0 / 3f64.sqrt();
        for v in e {
            assert!((v - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unknown_node() {
        let snap = path_graph();
        let analysis = SnapshotAnalysis::new(&snap);
        assert!(analysis.index_of("zz").is_err());
    }
}
