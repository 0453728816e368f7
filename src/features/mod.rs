//! Community descriptors.
//!
//! Each community of a snapshot is summarised by a fixed-length
//! [`FeatureVector`]. The descriptors fall into three groups:
//!
//! | Group | Descriptors | Graph |
//! |-------|-------------|-------|
//! | Structure | size, density, activity | induced subgraph |
//! | Position | clustering, closeness, degree, leadership, cohesion | whole snapshot |
//! | Composition | type ratios, key nodes | members + social position |
//!
//! ## Key nodes
//!
//! Every induced edge moves `|SP(u) - SP(v)|` from its lower-positioned
//! endpoint to its higher-positioned one. Nodes that end up with a positive
//! balance within a factor `alpha` of the best balance are key nodes. With
//! no variation in social position the whole community is returned.
//!
//! ## Cohesion
//!
//! ```text
//!              internal / (n (n - 1))
//! cohesion = ──────────────────────────
//!             external / (N (N - n))
//! ```
//!
//! A community with no outside weight gets [`COHESION_SENTINEL`].

pub mod centrality;

pub use centrality::SnapshotAnalysis;

use crate::community::{Community, Partition, SocialPosition, MIN_COMMUNITY_SIZE};
use crate::error::{Error, Result};
use crate::record::{NodeId, NodeKind};
use crate::snapshot::Snapshot;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cohesion of a community with zero external weight.
pub const COHESION_SENTINEL: f64 = 10_000.0;

/// Default key-node ratio threshold.
pub const DEFAULT_KEY_NODE_ALPHA: f64 = 10.0;

/// Activity over the induced subgraph's edge weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Largest edge weight.
    pub max: f64,
    /// Total weight divided by community size.
    pub mean: f64,
    /// Total weight.
    pub sum: f64,
}

/// Descriptors of one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Number of members.
    pub size: f64,
    /// Induced-subgraph density.
    pub density: f64,
    /// Mean weighted clustering coefficient.
    pub clustering: f64,
    /// Mean closeness centrality.
    pub avg_closeness: f64,
    /// Mean weighted degree.
    pub degree: f64,
    /// Degree centralization.
    pub leadership: f64,
    /// Internal over external connection strength.
    pub cohesion: f64,
    /// Number of key nodes.
    pub key_nodes: f64,
    /// Induced edge-weight activity.
    pub activity: Activity,
    /// Fraction of members per kind, in [`NodeKind::ALL`] order.
    pub type_ratio: [f64; 4],
    /// Mean weighted degree of the key nodes.
    pub key_degree: f64,
    /// Mean closeness of the key nodes.
    pub key_avg_closeness: f64,
    /// Mean eigenvector centrality, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eigenvector: Option<f64>,
    /// Mean eigenvector centrality of the key nodes, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_eigenvector: Option<f64>,
}

impl FeatureVector {
    /// Column names, optionally including the eigenvector columns.
    pub fn columns(with_eigenvector: bool) -> Vec<String> {
        let mut names: Vec<String> = [
            "size",
            "density",
            "clustering",
            "avg_closeness",
            "degree",
            "leadership",
            "cohesion",
            "key_nodes",
            "max_activity",
            "mean_activity",
            "sum_activity",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend(NodeKind::ALL.iter().map(|k| format!("%{k}")));
        names.push("key_degree".to_string());
        names.push("key_avg_closeness".to_string());
        if with_eigenvector {
            names.push("eigenvector".to_string());
            names.push("key_eigenvector".to_string());
        }
        names
    }

    /// Column names of this vector.
    pub fn names(&self) -> Vec<String> {
        Self::columns(self.eigenvector.is_some())
    }

    /// Flatten to the column order of [`FeatureVector::names`].
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = vec![
            self.size,
            self.density,
            self.clustering,
            self.avg_closeness,
            self.degree,
            self.leadership,
            self.cohesion,
            self.key_nodes,
            self.activity.max,
            self.activity.mean,
            self.activity.sum,
        ];
        out.extend_from_slice(&self.type_ratio);
        out.push(self.key_degree);
        out.push(self.key_avg_closeness);
        if let (Some(e), Some(k)) = (self.eigenvector, self.key_eigenvector) {
            out.push(e);
            out.push(k);
        }
        out
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Always false; a feature vector has a fixed set of columns.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Feature extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Key-node threshold: a node qualifies when `max_score / score < alpha`.
    pub key_node_alpha: f64,
    /// Append community and key-node eigenvector centrality.
    pub eigenvector: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            key_node_alpha: DEFAULT_KEY_NODE_ALPHA,
            eigenvector: false,
        }
    }
}

impl FeatureConfig {
    /// Set the key-node threshold.
    pub fn with_key_node_alpha(mut self, alpha: f64) -> Self {
        self.key_node_alpha = alpha;
        self
    }

    /// Enable or disable the eigenvector columns.
    pub fn with_eigenvector(mut self, enabled: bool) -> Self {
        self.eigenvector = enabled;
        self
    }
}

/// Computes [`FeatureVector`]s.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    /// Extractor with the given settings.
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Describe one community.
    pub fn extract(
        &self,
        analysis: &SnapshotAnalysis<'_>,
        community: &Community,
        positions: &SocialPosition,
    ) -> Result<FeatureVector> {
        let snapshot = analysis.snapshot();
        let members = community.members();
        let scores = positions.scores_of(community)?;
        let keys = key_nodes(snapshot, members, &scores, self.config.key_node_alpha)?;

        let ratios = type_ratio(snapshot, members)?;
        let mut type_ratio = [0.0; 4];
        for (slot, kind) in type_ratio.iter_mut().zip(NodeKind::ALL) {
            *slot = ratios.get(&kind).copied().unwrap_or(0.0);
        }

        let (eigenvector, key_eigenvector) = if self.config.eigenvector {
            (
                Some(average_eigenvector(analysis, members)?),
                Some(average_eigenvector(analysis, &keys)?),
            )
        } else {
            (None, None)
        };

        Ok(FeatureVector {
            size: members.len() as f64,
            density: density(snapshot, members)?,
            clustering: clustering(snapshot, members)?,
            avg_closeness: average_closeness(analysis, members)?,
            degree: degree(snapshot, members)?,
            leadership: leadership(snapshot, members)?,
            cohesion: cohesion(snapshot, members)?,
            key_nodes: keys.len() as f64,
            activity: activity(snapshot, members)?,
            type_ratio,
            key_degree: degree(snapshot, &keys)?,
            key_avg_closeness: average_closeness(analysis, &keys)?,
            eigenvector,
            key_eigenvector,
        })
    }

    /// Describe every community of the snapshot at position `index`.
    pub fn extract_partition(
        &self,
        index: usize,
        snapshot: &Snapshot,
        partition: &Partition,
        positions: &SocialPosition,
    ) -> Result<Vec<FeatureVector>> {
        let analysis = SnapshotAnalysis::new(snapshot);
        let out = partition
            .iter()
            .enumerate()
            .map(|(c, community)| {
                self.extract(&analysis, community, positions)
                    .map_err(|e| e.in_community(index, c))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(snapshot = index, communities = out.len(), "features extracted");
        Ok(out)
    }

    /// Describe every community of every snapshot.
    ///
    /// Errors carry the snapshot and community index.
    pub fn extract_all(
        &self,
        snapshots: &[Snapshot],
        partitions: &[Partition],
        positions: &[SocialPosition],
    ) -> Result<Vec<Vec<FeatureVector>>> {
        check_lengths(snapshots.len(), partitions.len())?;
        check_lengths(snapshots.len(), positions.len())?;

        let one = |s: usize| self.extract_partition(s, &snapshots[s], &partitions[s], &positions[s]);

        #[cfg(feature = "parallel")]
        let out: Result<Vec<Vec<FeatureVector>>> =
            (0..snapshots.len()).into_par_iter().map(one).collect();
        #[cfg(not(feature = "parallel"))]
        let out: Result<Vec<Vec<FeatureVector>>> = (0..snapshots.len()).map(one).collect();
        out
    }
}

fn check_lengths(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::LengthMismatch { expected, found });
    }
    Ok(())
}

/// Graph indices of `members`, failing on ids outside the snapshot.
fn resolve(snapshot: &Snapshot, members: &[NodeId]) -> Result<Vec<NodeIndex>> {
    members
        .iter()
        .map(|m| {
            snapshot
                .index_of(m)
                .ok_or_else(|| Error::UnknownNode(m.clone()))
        })
        .collect()
}

/// Edges with both endpoints in `members`, each reported once.
fn induced_edges(snapshot: &Snapshot, members: &[NodeIndex]) -> Vec<(NodeIndex, NodeIndex, f64)> {
    let set: HashSet<NodeIndex> = members.iter().copied().collect();
    let graph = snapshot.graph();
    let mut out = Vec::new();
    for &u in &set {
        for edge in graph.edges(u) {
            let v = edge.target();
            if u.index() < v.index() && set.contains(&v) {
                out.push((u, v, *edge.weight()));
            }
        }
    }
    out.sort_by_key(|&(u, v, _)| (u.index(), v.index()));
    out
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Adjacent ordered member pairs over `n² - n`; 1 for a complete subgraph.
///
/// Each induced edge counts once per direction, so this is `2E / (n² - n)`
/// rather than `E / (n² - n)`.
pub fn density(snapshot: &Snapshot, members: &[NodeId]) -> Result<f64> {
    let idx = resolve(snapshot, members)?;
    let n = idx.len();
    if n < 2 {
        return Err(Error::InvalidCommunity {
            size: n,
            required: 2,
        });
    }
    let edges = induced_edges(snapshot, &idx).len();
    Ok((2 * edges) as f64 / (n * n - n) as f64)
}

/// Weighted clustering coefficient of one node over the whole snapshot.
///
/// Edge weights are scaled by the snapshot's largest weight; each triangle
/// contributes the geometric mean of its three scaled weights.
pub fn node_clustering(snapshot: &Snapshot, node: NodeIndex, max_weight: f64) -> f64 {
    let graph = snapshot.graph();
    let nbrs: HashMap<NodeIndex, f64> = graph
        .edges(node)
        .filter(|e| e.target() != node)
        .map(|e| (e.target(), *e.weight()))
        .collect();
    let deg = nbrs.len();
    if deg < 2 || max_weight <= 0.0 {
        return 0.0;
    }

    let mut triangles = 0.0;
    for (&v, &w_uv) in &nbrs {
        for edge in graph.edges(v) {
            let w = edge.target();
            if v.index() >= w.index() {
                continue;
            }
            if let Some(&w_uw) = nbrs.get(&w) {
                let product = (w_uv / max_weight) * (w_uw / max_weight) * (*edge.weight() / max_weight);
                triangles += product.cbrt();
            }
        }
    }
    2.0 * triangles / (deg * (deg - 1)) as f64
}

/// Mean weighted clustering coefficient of the members.
pub fn clustering(snapshot: &Snapshot, members: &[NodeId]) -> Result<f64> {
    let idx = resolve(snapshot, members)?;
    let max_weight = snapshot
        .graph()
        .edge_weights()
        .copied()
        .fold(0.0_f64, f64::max);
    Ok(mean(
        idx.iter()
            .map(|&u| node_clustering(snapshot, u, max_weight)),
    ))
}

/// Mean closeness centrality of the members (0 for an empty set).
pub fn average_closeness(analysis: &SnapshotAnalysis<'_>, members: &[NodeId]) -> Result<f64> {
    let idx = resolve(analysis.snapshot(), members)?;
    if idx.is_empty() {
        return Ok(0.0);
    }
    let closeness = analysis.closeness();
    Ok(mean(idx.iter().map(|u| closeness[u.index()])))
}

/// Mean eigenvector centrality of the members (0 for an empty set).
pub fn average_eigenvector(analysis: &SnapshotAnalysis<'_>, members: &[NodeId]) -> Result<f64> {
    let idx = resolve(analysis.snapshot(), members)?;
    if idx.is_empty() {
        return Ok(0.0);
    }
    let eigenvector = analysis.eigenvector();
    Ok(mean(idx.iter().map(|u| eigenvector[u.index()])))
}

/// Mean weighted degree of the members (0 for an empty set).
pub fn degree(snapshot: &Snapshot, members: &[NodeId]) -> Result<f64> {
    let idx = resolve(snapshot, members)?;
    Ok(mean(idx.iter().map(|&u| snapshot.weighted_degree(u))))
}

/// Degree centralization: `Σ(max_degree - d_i) / ((n - 2)(n - 1))`.
pub fn leadership(snapshot: &Snapshot, members: &[NodeId]) -> Result<f64> {
    require_community(members)?;
    let idx = resolve(snapshot, members)?;
    let degrees: Vec<f64> = idx.iter().map(|&u| snapshot.weighted_degree(u)).collect();
    let max_degree = degrees.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n = degrees.len();
    let spread: f64 = degrees.iter().map(|d| max_degree - d).sum();
    Ok(spread / ((n - 2) * (n - 1)) as f64)
}

/// Internal versus external connection strength.
pub fn cohesion(snapshot: &Snapshot, members: &[NodeId]) -> Result<f64> {
    require_community(members)?;
    let idx = resolve(snapshot, members)?;
    let set: HashSet<NodeIndex> = idx.into_iter().collect();

    let (mut internal, mut external) = (0.0, 0.0);
    for edge in snapshot.graph().edge_references() {
        match (set.contains(&edge.source()), set.contains(&edge.target())) {
            (true, true) => internal += *edge.weight(),
            (true, false) | (false, true) => external += *edge.weight(),
            (false, false) => {}
        }
    }
    if external == 0.0 {
        return Ok(COHESION_SENTINEL);
    }

    let n = set.len() as f64;
    let total = snapshot.node_count() as f64;
    Ok((internal / (n * (n - 1.0))) / (external / (total * (total - n))))
}

fn require_community(members: &[NodeId]) -> Result<()> {
    if members.len() < MIN_COMMUNITY_SIZE {
        return Err(Error::InvalidCommunity {
            size: members.len(),
            required: MIN_COMMUNITY_SIZE,
        });
    }
    Ok(())
}

/// Fraction of members per node kind; kinds with no members are absent.
pub fn type_ratio(snapshot: &Snapshot, members: &[NodeId]) -> Result<BTreeMap<NodeKind, f64>> {
    let mut counts: BTreeMap<NodeKind, usize> = BTreeMap::new();
    for m in members {
        let kind = snapshot.kind(m).ok_or_else(|| Error::MissingAttribute {
            node: m.clone(),
            attribute: "type",
        })?;
        *counts.entry(kind).or_insert(0) += 1;
    }
    let n = members.len() as f64;
    Ok(counts
        .into_iter()
        .map(|(kind, count)| (kind, count as f64 / n))
        .collect())
}

/// Max, per-member mean and total of the induced edge weights.
pub fn activity(snapshot: &Snapshot, members: &[NodeId]) -> Result<Activity> {
    let idx = resolve(snapshot, members)?;
    let edges = induced_edges(snapshot, &idx);
    if edges.is_empty() || idx.is_empty() {
        return Ok(Activity::default());
    }
    let sum: f64 = edges.iter().map(|e| e.2).sum();
    let max = edges.iter().map(|e| e.2).fold(f64::NEG_INFINITY, f64::max);
    Ok(Activity {
        max,
        mean: sum / idx.len() as f64,
        sum,
    })
}

/// Members whose position-transfer balance is near the top balance.
///
/// `scores[i]` is the social position of `members[i]`.
pub fn key_nodes(
    snapshot: &Snapshot,
    members: &[NodeId],
    scores: &[f64],
    alpha: f64,
) -> Result<Vec<NodeId>> {
    if scores.len() != members.len() {
        return Err(Error::LengthMismatch {
            expected: members.len(),
            found: scores.len(),
        });
    }
    if scores.windows(2).all(|w| w[0] == w[1]) {
        return Ok(members.to_vec());
    }

    let idx = resolve(snapshot, members)?;
    let slot: HashMap<NodeIndex, usize> = idx.iter().enumerate().map(|(i, &u)| (u, i)).collect();
    let mut balance = vec![0.0; members.len()];
    for (u, v, _) in induced_edges(snapshot, &idx) {
        let (i, j) = (slot[&u], slot[&v]);
        let diff = (scores[i] - scores[j]).abs();
        if scores[i] < scores[j] {
            balance[i] -= diff;
            balance[j] += diff;
        } else {
            balance[i] += diff;
            balance[j] -= diff;
        }
    }

    let top = balance.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(members
        .iter()
        .zip(&balance)
        .filter(|&(_, &b)| b > 0.0 && top / b < alpha)
        .map(|(m, _)| m.clone())
        .collect())
}
