//! Time-decayed weighted graph snapshots.
//!
//! A snapshot is the relationship state "as of" one end date: every edge
//! record dated on or before that date contributes a decayed weight to its
//! node pair, contributions between the same pair accumulate, and an
//! expired (or negatively weighted) record drops the pair's edge entirely.
//!
//! ```text
//! records ──sort by date──▶ fold into pair weights ──drop isolates──▶ Snapshot
//!                               ▲
//!                        DecayConfig::decay(relation, age)
//! ```
//!
//! [`SnapshotBuilder::generate`] repeats the construction on a sliding end
//! date, producing a [`SnapshotSeries`].

pub mod decay;

pub use decay::{DecayConfig, REMOVE};

use crate::error::{Error, Result};
use crate::record::{EdgeRecord, NodeId, NodeKind, NodeRecord, RelationKind, DATE_FORMAT};
use chrono::{Duration, NaiveDate};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Node payload stored in a snapshot graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNode {
    /// Node id.
    pub id: NodeId,
    /// Category.
    pub kind: NodeKind,
}

/// Undirected weighted graph valid as of `end_time`. Immutable once built.
///
/// Serializes as a [`SnapshotRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct Snapshot {
    end_time: NaiveDate,
    graph: UnGraph<SnapshotNode, f64>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Snapshot {
    /// Assemble a snapshot from explicit nodes and weighted edges.
    ///
    /// Nodes are kept as given (isolated ones included). Edges naming an
    /// unknown node fail with [`Error::UnknownNode`]; repeated pairs add up.
    pub fn from_weighted_edges<I, E>(end_time: NaiveDate, nodes: I, edges: E) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, NodeKind)>,
        E: IntoIterator<Item = (NodeId, NodeId, f64)>,
    {
        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::new();
        for (id, kind) in nodes {
            if index.contains_key(&id) {
                continue;
            }
            let idx = graph.add_node(SnapshotNode {
                id: id.clone(),
                kind,
            });
            let _ = index.insert(id, idx);
        }
        for (source, target, weight) in edges {
            let a = *index.get(&source).ok_or(Error::UnknownNode(source))?;
            let b = *index.get(&target).ok_or(Error::UnknownNode(target))?;
            match graph.find_edge(a, b) {
                Some(e) => graph[e] += weight,
                None => {
                    let _ = graph.add_edge(a, b, weight);
                }
            }
        }
        Ok(Self {
            end_time,
            graph,
            index,
        })
    }

    /// End date this snapshot is valid for.
    pub fn end_time(&self) -> NaiveDate {
        self.end_time
    }

    /// End date rendered as `YYYY-MM-DD`.
    pub fn label(&self) -> String {
        self.end_time.format(DATE_FORMAT).to_string()
    }

    /// Underlying graph.
    pub fn graph(&self) -> &UnGraph<SnapshotNode, f64> {
        &self.graph
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the snapshot contains `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Graph index of a node.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Node payload at a graph index.
    pub fn node(&self, idx: NodeIndex) -> &SnapshotNode {
        &self.graph[idx]
    }

    /// Category of a node.
    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.index_of(id).map(|idx| self.graph[idx].kind)
    }

    /// Weight of the edge between two nodes, if any.
    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let (a, b) = (self.index_of(a)?, self.index_of(b)?);
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// Sum of incident edge weights.
    pub fn weighted_degree(&self, idx: NodeIndex) -> f64 {
        self.graph.edges(idx).map(|e| *e.weight()).sum()
    }

    /// Node ids in graph order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_weights().map(|n| n.id.as_str())
    }

    /// Edges as `(source, target, weight)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
                *e.weight(),
            )
        })
    }
}

/// Plain, serializable form of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// End date the snapshot is valid for.
    pub end_time: NaiveDate,
    /// Nodes in graph order.
    pub nodes: Vec<(NodeId, NodeKind)>,
    /// Edges as `(source, target, weight)`, in graph order.
    pub edges: Vec<(NodeId, NodeId, f64)>,
}

impl From<Snapshot> for SnapshotRecord {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            end_time: snapshot.end_time,
            nodes: snapshot
                .graph
                .node_weights()
                .map(|n| (n.id.clone(), n.kind))
                .collect(),
            edges: snapshot
                .edges()
                .map(|(a, b, w)| (a.to_string(), b.to_string(), w))
                .collect(),
        }
    }
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = Error;

    fn try_from(record: SnapshotRecord) -> Result<Self> {
        Snapshot::from_weighted_edges(record.end_time, record.nodes, record.edges)
    }
}

/// Ordered snapshots with their end-date labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSeries {
    /// Snapshots in end-date order.
    pub snapshots: Vec<Snapshot>,
    /// `YYYY-MM-DD` label per snapshot.
    pub labels: Vec<String>,
}

impl SnapshotSeries {
    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot at `index`.
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Iterate over snapshots.
    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }
}

/// Sliding-window parameters for [`SnapshotBuilder::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Window {
    /// First end date.
    pub start: NaiveDate,
    /// Days between consecutive end dates.
    pub size_days: i64,
    /// Generation stops once the end date reaches this date.
    pub cutoff: NaiveDate,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2016, 8, 1).unwrap_or(NaiveDate::MIN),
            size_days: 30,
            cutoff: NaiveDate::from_ymd_opt(2019, 12, 30).unwrap_or(NaiveDate::MAX),
        }
    }
}

impl Window {
    /// Window from `start` to `cutoff` in steps of `size_days`.
    pub fn new(start: NaiveDate, size_days: i64, cutoff: NaiveDate) -> Self {
        Self {
            start,
            size_days,
            cutoff,
        }
    }

    /// End dates covered by this window, in order.
    pub fn end_times(&self) -> Result<Vec<NaiveDate>> {
        if self.size_days <= 0 {
            return Err(Error::InvalidParameter {
                name: "window_size",
                message: "must be at least one day",
            });
        }
        let step = Duration::days(self.size_days);
        let mut out = Vec::new();
        let mut end_time = self.start;
        while end_time < self.cutoff {
            out.push(end_time);
            end_time += step;
        }
        Ok(out)
    }
}

/// An edge record with its parsed date, ready for folding.
#[derive(Debug, Clone)]
struct DatedEdge<'a> {
    date: NaiveDate,
    source: &'a str,
    target: &'a str,
    relation: RelationKind,
}

/// Builds decayed snapshots from raw records.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    decay: DecayConfig,
    excluded: BTreeSet<NodeKind>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Builder with default decay and `Event` nodes excluded.
    pub fn new() -> Self {
        Self {
            decay: DecayConfig::default(),
            excluded: [NodeKind::Event].into_iter().collect(),
        }
    }

    /// Set decay parameters.
    pub fn with_decay(mut self, decay: DecayConfig) -> Self {
        self.decay = decay;
        self
    }

    /// Set which node kinds are left out of snapshots.
    pub fn with_excluded_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.excluded = kinds.into_iter().collect();
        self
    }

    /// Decay parameters in use.
    pub fn decay(&self) -> &DecayConfig {
        &self.decay
    }

    /// Build the snapshot valid at `end_time`.
    pub fn build(
        &self,
        end_time: NaiveDate,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
    ) -> Result<Snapshot> {
        self.decay.validate()?;
        let dated = prepare(edges)?;
        Ok(self.fold(end_time, nodes, &dated))
    }

    /// Build one snapshot per end date of `window`.
    pub fn generate(
        &self,
        window: &Window,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
    ) -> Result<SnapshotSeries> {
        self.decay.validate()?;
        let end_times = window.end_times()?;
        let dated = prepare(edges)?;
        info!(
            snapshots = end_times.len(),
            nodes = nodes.len(),
            edges = dated.len(),
            "generating snapshots"
        );

        #[cfg(feature = "parallel")]
        let snapshots: Vec<Snapshot> = end_times
            .par_iter()
            .map(|&t| self.fold(t, nodes, &dated))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let snapshots: Vec<Snapshot> = end_times
            .iter()
            .map(|&t| self.fold(t, nodes, &dated))
            .collect();

        let labels = snapshots.iter().map(Snapshot::label).collect();
        Ok(SnapshotSeries { snapshots, labels })
    }

    /// Fold date-sorted edges into pair weights and materialise the graph.
    fn fold(&self, end_time: NaiveDate, nodes: &[NodeRecord], dated: &[DatedEdge<'_>]) -> Snapshot {
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut kept: Vec<&NodeRecord> = Vec::new();
        for node in nodes {
            if self.excluded.contains(&node.kind) || position.contains_key(node.id.as_str()) {
                continue;
            }
            let _ = position.insert(node.id.as_str(), kept.len());
            kept.push(node);
        }

        let mut weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for edge in dated.iter().take_while(|e| e.date <= end_time) {
            let (Some(&a), Some(&b)) = (position.get(edge.source), position.get(edge.target))
            else {
                continue;
            };
            if a == b {
                continue;
            }
            let key = (a.min(b), a.max(b));
            let age = (end_time - edge.date).num_days() as f64;
            let weight = self.decay.decay(edge.relation, age);
            if weight < 0.0 {
                // Drops everything accumulated for the pair so far.
                let _ = weights.remove(&key);
            } else {
                *weights.entry(key).or_insert(0.0) += weight;
            }
        }

        let mut connected = vec![false; kept.len()];
        for &(a, b) in weights.keys() {
            connected[a] = true;
            connected[b] = true;
        }

        let mut graph = UnGraph::with_capacity(kept.len(), weights.len());
        let mut index = HashMap::new();
        let mut remap = vec![None; kept.len()];
        for (pos, node) in kept.iter().enumerate() {
            if !connected[pos] {
                continue;
            }
            let idx = graph.add_node(SnapshotNode {
                id: node.id.clone(),
                kind: node.kind,
            });
            remap[pos] = Some(idx);
            let _ = index.insert(node.id.clone(), idx);
        }
        for (&(a, b), &w) in &weights {
            if let (Some(ia), Some(ib)) = (remap[a], remap[b]) {
                let _ = graph.add_edge(ia, ib, w);
            }
        }

        debug!(
            end_time = %end_time,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "snapshot built"
        );
        Snapshot {
            end_time,
            graph,
            index,
        }
    }
}

/// Parse dates and sort edges ascending by date (stable).
fn prepare(edges: &[EdgeRecord]) -> Result<Vec<DatedEdge<'_>>> {
    let mut dated = Vec::with_capacity(edges.len());
    for edge in edges {
        let date = edge.date()?;
        if edge.source == edge.target {
            warn!(node = %edge.source, "ignoring self-loop edge record");
            continue;
        }
        dated.push(DatedEdge {
            date,
            source: edge.source.as_str(),
            target: edge.target.as_str(),
            relation: edge.relation_kind(),
        });
    }
    dated.sort_by_key(|e| e.date);
    Ok(dated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::parse_date;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn nodes() -> Vec<NodeRecord> {
        vec![
            NodeRecord::new("a", NodeKind::Stakeholder),
            NodeRecord::new("b", NodeKind::Service),
            NodeRecord::new("c", NodeKind::Stakeholder),
            NodeRecord::new("e", NodeKind::Event),
            NodeRecord::new("lonely", NodeKind::Stakeholder),
        ]
    }

    #[test]
    fn test_future_edges_ignored_and_isolates_dropped() {
        let edges = vec![
            EdgeRecord::structural("a", "b").at("2016-01-01"),
            EdgeRecord::structural("b", "c").at("2017-01-01"),
        ];
        let snap = SnapshotBuilder::new()
            .build(d("2016-06-01"), &nodes(), &edges)
            .unwrap();
        assert_eq!(snap.node_count(), 2);
        assert_eq!(snap.weight("a", "b"), Some(2.0));
        assert!(!snap.contains("c"));
        assert!(!snap.contains("lonely"));
    }

    #[test]
    fn test_event_nodes_excluded() {
        let edges = vec![
            EdgeRecord::structural("a", "e"),
            EdgeRecord::structural("a", "b"),
        ];
        let snap = SnapshotBuilder::new()
            .build(d("2016-06-01"), &nodes(), &edges)
            .unwrap();
        assert!(!snap.contains("e"));
        assert_eq!(snap.edge_count(), 1);

        let keep_all = SnapshotBuilder::new()
            .with_excluded_kinds([])
            .build(d("2016-06-01"), &nodes(), &edges)
            .unwrap();
        assert_eq!(keep_all.kind("e"), Some(NodeKind::Event));
    }

    #[test]
    fn test_repeated_events_accumulate() {
        let edges = vec![
            EdgeRecord::event("a", "b", "partnership").at("2016-05-01"),
            EdgeRecord::event("b", "a", "partnership").at("2016-03-02"),
        ];
        let snap = SnapshotBuilder::new()
            .build(d("2016-05-31"), &nodes(), &edges)
            .unwrap();
        // 30 days -> 2.5, 90 days -> 2.5 / 3
        let expected = 2.5 + 2.5 / 3.0;
        assert!((snap.weight("a", "b").unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_removal_drops_accumulated_weight() {
        let edges = vec![
            EdgeRecord::event("a", "b", "join").at("2015-01-01"),
            EdgeRecord::structural("a", "c").at("2015-01-01"),
            EdgeRecord::event("a", "b", "exit").at("2016-01-01"),
        ];
        let snap = SnapshotBuilder::new()
            .build(d("2016-02-01"), &nodes(), &edges)
            .unwrap();
        assert_eq!(snap.weight("a", "b"), None);
        assert!(!snap.contains("b"));
        assert_eq!(snap.weight("a", "c"), Some(2.0));
    }

    #[test]
    fn test_expired_edge_removed() {
        let edges = vec![
            EdgeRecord::event("a", "b", "talk").at("2015-01-01"),
            EdgeRecord::structural("b", "c"),
        ];
        let snap = SnapshotBuilder::new()
            .build(d("2016-06-01"), &nodes(), &edges)
            .unwrap();
        assert_eq!(snap.weight("a", "b"), None);
        assert!(!snap.contains("a"));
    }

    #[test]
    fn test_bad_date_fails() {
        let edges = vec![EdgeRecord::structural("a", "b").at("yesterday")];
        let err = SnapshotBuilder::new()
            .build(d("2016-06-01"), &nodes(), &edges)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_generate_windows() {
        let edges = vec![
            EdgeRecord::structural("a", "b").at("2016-01-01"),
            EdgeRecord::structural("b", "c").at("2016-02-15"),
        ];
        let window = Window {
            start: d("2016-01-10"),
            size_days: 30,
            cutoff: d("2016-03-10"),
        };
        let series = SnapshotBuilder::new()
            .generate(&window, &nodes(), &edges)
            .unwrap();
        assert_eq!(series.labels, vec!["2016-01-10", "2016-02-09"]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.snapshots[0].node_count(), 2);
        assert_eq!(series.snapshots[1].node_count(), 2);

        let window = Window { cutoff: d("2016-03-11"), ..window };
        let series = SnapshotBuilder::new()
            .generate(&window, &nodes(), &edges)
            .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.snapshots[2].node_count(), 3);
    }

    #[test]
    fn test_zero_window_rejected() {
        let window = Window {
            start: d("2016-01-10"),
            size_days: 0,
            cutoff: d("2016-03-10"),
        };
        assert!(SnapshotBuilder::new().generate(&window, &nodes(), &[]).is_err());
    }

    #[test]
    fn test_from_weighted_edges() {
        let snap = Snapshot::from_weighted_edges(
            d("2016-01-01"),
            vec![("x".to_string(), NodeKind::Service), ("y".to_string(), NodeKind::Service)],
            vec![("x".to_string(), "y".to_string(), 1.5), ("y".to_string(), "x".to_string(), 0.5)],
        )
        .unwrap();
        assert_eq!(snap.weight("y", "x"), Some(2.0));
        assert_eq!(snap.weighted_degree(snap.index_of("x").unwrap()), 2.0);

        let err = Snapshot::from_weighted_edges(
            d("2016-01-01"),
            vec![("x".to_string(), NodeKind::Service)],
            vec![("x".to_string(), "z".to_string(), 1.0)],
        )
        .unwrap_err();
        assert_eq!(err, Error::UnknownNode("z".to_string()));
    }

    #[test]
    fn test_serde_shapes() {
        let edges = vec![
            EdgeRecord::structural("a", "b").at("2016-01-01"),
            EdgeRecord::event("b", "c", "join").at("2016-02-01"),
        ];
        let window = Window::new(d("2016-01-15"), 30, d("2016-03-01"));
        let series = SnapshotBuilder::new()
            .generate(&window, &nodes(), &edges)
            .unwrap();

        let snap = Snapshot::from_weighted_edges(
            d("2016-01-01"),
            vec![("x".to_string(), NodeKind::Service), ("y".to_string(), NodeKind::Other)],
            vec![("x".to_string(), "y".to_string(), 1.5)],
        )
        .unwrap();
        let json = serde_json::to_string(&snap).unwrap();
        assert_eq!(
            json,
            r#"{"end_time":"2016-01-01","nodes":[["x","Service"],["y","Other"]],"edges":[["x","y",1.5]]}"#
        );

        let json = serde_json::to_string(&series).unwrap();
        let back: SnapshotSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labels, series.labels);
        assert_eq!(back.len(), series.len());
        for (a, b) in back.iter().zip(series.iter()) {
            assert_eq!(SnapshotRecord::from(a.clone()), SnapshotRecord::from(b.clone()));
            assert_eq!(a.weight("b", "c"), b.weight("b", "c"));
        }
    }

    #[test]
    fn test_deserialize_rejects_dangling_edge() {
        let json = r#"{"end_time":"2016-01-01","nodes":[["x","Service"]],"edges":[["x","z",1.0]]}"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }
}
