//! Meta-community evolution network.
//!
//! One node per (snapshot, community), one directed edge per classified
//! relation between communities of consecutive snapshots:
//!
//! ```text
//!  T0          T1          T2
//! T0C0 ──g──▶ T1C0 ──c──▶ T2C0
//!        ╲
//! T0C1    ╲─m─▶ T1C1      T2C1   (forming)
//! ```
//!
//! Each node carries the event it was entered through (`pre`) and the
//! event it leaves through (`next`), both aggregated by [`crate::ged`].

use crate::community::{Partition, SocialPosition};
use crate::error::{Error, Result};
use crate::ged::{Event, Ged, Relation};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// A community seen as a node of the evolution network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaNode {
    /// Snapshot index.
    pub snapshot: usize,
    /// Community index within the snapshot.
    pub community: usize,
    /// Event through which the community was entered.
    pub pre: Event,
    /// Event through which the community is left.
    pub next: Event,
}

impl MetaNode {
    /// A node with both events set to [`Event::None`].
    pub fn new(snapshot: usize, community: usize) -> Self {
        Self {
            snapshot,
            community,
            pre: Event::None,
            next: Event::None,
        }
    }

    /// `T{snapshot}C{community}`.
    pub fn label(&self) -> String {
        format!("T{}C{}", self.snapshot, self.community)
    }

    /// Parse a `T{snapshot}C{community}` label.
    pub fn parse_label(label: &str) -> Option<(usize, usize)> {
        let rest = label.strip_prefix('T')?;
        let (snapshot, community) = rest.split_once('C')?;
        Some((snapshot.parse().ok()?, community.parse().ok()?))
    }
}

impl fmt::Display for MetaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}C{}", self.snapshot, self.community)
    }
}

/// Next-event counts of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    /// Snapshot index.
    pub snapshot: usize,
    /// Count per event; events that never occur are absent.
    pub counts: BTreeMap<Event, usize>,
}

impl EventCounts {
    /// Count of one event.
    pub fn get(&self, event: Event) -> usize {
        self.counts.get(&event).copied().unwrap_or(0)
    }
}

/// Plain, serializable form of a [`MetaNetwork`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaNetworkRecord {
    /// Nodes in creation order.
    pub nodes: Vec<MetaNode>,
    /// Edges as `(source label, target label, relation)`.
    pub edges: Vec<(String, String, Relation)>,
}

/// Directed evolution graph over all communities of all snapshots.
#[derive(Debug, Clone, Default)]
pub struct MetaNetwork {
    graph: DiGraph<MetaNode, Relation>,
    /// `by_snapshot[s][c]` is the node of community `c` in snapshot `s`.
    by_snapshot: Vec<Vec<NodeIndex>>,
}

impl MetaNetwork {
    /// Build the network from per-snapshot partitions and social positions.
    ///
    /// Consecutive snapshots are classified in order; the first failing
    /// pair aborts the build with its transition context.
    pub fn build(
        partitions: &[Partition],
        positions: &[SocialPosition],
        ged: &Ged,
    ) -> Result<Self> {
        if partitions.len() != positions.len() {
            return Err(Error::LengthMismatch {
                expected: partitions.len(),
                found: positions.len(),
            });
        }
        ged.validate()?;

        let mut graph = DiGraph::new();
        let by_snapshot: Vec<Vec<NodeIndex>> = partitions
            .iter()
            .enumerate()
            .map(|(s, partition)| {
                (0..partition.len())
                    .map(|c| graph.add_node(MetaNode::new(s, c)))
                    .collect()
            })
            .collect();

        for s in 0..partitions.len().saturating_sub(1) {
            let transitions = ged.transitions(
                s,
                &partitions[s],
                &partitions[s + 1],
                &positions[s],
                &positions[s + 1],
            )?;
            for pair in &transitions.pairs {
                let _ = graph.add_edge(
                    by_snapshot[s][pair.from],
                    by_snapshot[s + 1][pair.to],
                    pair.relation,
                );
            }
            for (c, event) in transitions.next_events().into_iter().enumerate() {
                graph[by_snapshot[s][c]].next = event;
            }
            for (c, event) in transitions.pre_events().into_iter().enumerate() {
                graph[by_snapshot[s + 1][c]].pre = event;
            }
        }

        info!(
            snapshots = partitions.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "meta-community network built"
        );
        Ok(Self { graph, by_snapshot })
    }

    /// Underlying graph.
    pub fn graph(&self) -> &DiGraph<MetaNode, Relation> {
        &self.graph
    }

    /// Number of meta-nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of relations.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of snapshots covered.
    pub fn snapshot_count(&self) -> usize {
        self.by_snapshot.len()
    }

    /// Graph index of a community's node.
    pub fn index(&self, snapshot: usize, community: usize) -> Option<NodeIndex> {
        self.by_snapshot.get(snapshot)?.get(community).copied()
    }

    /// A community's node.
    pub fn node(&self, snapshot: usize, community: usize) -> Option<&MetaNode> {
        self.index(snapshot, community).map(|idx| &self.graph[idx])
    }

    /// A node by label (`T{s}C{c}`).
    pub fn node_by_label(&self, label: &str) -> Option<&MetaNode> {
        let (s, c) = MetaNode::parse_label(label)?;
        self.node(s, c)
    }

    /// Relation between two communities of consecutive snapshots.
    pub fn relation(&self, from: (usize, usize), to: (usize, usize)) -> Option<Relation> {
        let a = self.index(from.0, from.1)?;
        let b = self.index(to.0, to.1)?;
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// Successors of a node in edge-insertion order.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id().index(), e.target()))
            .collect();
        edges.sort_unstable_by_key(|&(id, _)| id);
        edges.into_iter().map(|(_, t)| t).collect()
    }

    /// Next-event counts per snapshot.
    pub fn event_distribution(&self) -> Vec<EventCounts> {
        self.by_snapshot
            .iter()
            .enumerate()
            .map(|(snapshot, nodes)| {
                let mut counts = BTreeMap::new();
                for &idx in nodes {
                    *counts.entry(self.graph[idx].next).or_insert(0) += 1;
                }
                EventCounts { snapshot, counts }
            })
            .collect()
    }

    /// Serializable form.
    pub fn to_record(&self) -> MetaNetworkRecord {
        MetaNetworkRecord {
            nodes: self.graph.node_weights().copied().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| {
                    (
                        self.graph[e.source()].label(),
                        self.graph[e.target()].label(),
                        *e.weight(),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::community::Community;

    fn community(ids: &[u32]) -> Community {
        ids.iter().map(|i| i.to_string()).collect()
    }

    fn uniform(ids: &[u32]) -> SocialPosition {
        ids.iter().map(|i| (i.to_string(), 1.0)).collect()
    }

    fn partition(groups: &[&[u32]]) -> Partition {
        Partition {
            communities: groups.iter().map(|g| community(g)).collect(),
        }
    }

    #[test]
    fn test_growing_then_continuing_labels() {
        let partitions = vec![
            partition(&[&[1, 2, 3]]),
            partition(&[&[1, 2, 3, 4]]),
            partition(&[&[1, 2, 3, 4]]),
        ];
        let sp = uniform(&[1, 2, 3, 4]);
        let positions = vec![sp.clone(), sp.clone(), sp];
        let net = MetaNetwork::build(&partitions, &positions, &Ged::default()).unwrap();

        assert_eq!(net.relation((0, 0), (1, 0)), Some(Relation::Growing));
        assert_eq!(net.relation((1, 0), (2, 0)), Some(Relation::Continuing));

        let b = net.node_by_label("T1C0").unwrap();
        assert_eq!(b.pre, Event::Growing);
        assert_eq!(b.next, Event::Continuing);

        // first snapshot has no predecessor, last has no successor
        assert_eq!(net.node(0, 0).unwrap().pre, Event::None);
        assert_eq!(net.node(2, 0).unwrap().next, Event::None);
    }

    #[test]
    fn test_node_count_matches_communities() {
        let partitions = vec![
            partition(&[&[1, 2, 3], &[4, 5, 6]]),
            partition(&[&[1, 2, 3]]),
            partition(&[&[7, 8, 9], &[1, 2, 3], &[4, 5, 6]]),
        ];
        let sp = uniform(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let positions = vec![sp.clone(); 3];
        let net = MetaNetwork::build(&partitions, &positions, &Ged::default()).unwrap();
        assert_eq!(net.node_count(), 6);
        assert_eq!(net.node(0, 1).unwrap().next, Event::Dissolving);
        assert_eq!(net.node(2, 0).unwrap().pre, Event::Forming);
        assert_eq!(net.node(2, 2).unwrap().pre, Event::Forming);

        let dist = net.event_distribution();
        assert_eq!(dist.len(), 3);
        assert_eq!(dist[0].get(Event::Dissolving), 1);
        assert_eq!(dist[0].get(Event::Continuing), 1);
    }

    #[test]
    fn test_every_edge_has_a_relation() {
        let partitions = vec![
            partition(&[&[1, 2, 3, 4, 5, 6]]),
            partition(&[&[1, 2, 3], &[4, 5, 6]]),
        ];
        let sp = uniform(&[1, 2, 3, 4, 5, 6]);
        let net =
            MetaNetwork::build(&partitions, &[sp.clone(), sp], &Ged::new(0.5, 0.5)).unwrap();
        // each half retains 1/2 · 1/2 forward and everything backward
        assert_eq!(net.edge_count(), 2);
        assert_eq!(net.relation((0, 0), (1, 0)), Some(Relation::Shrinking));
        assert_eq!(net.node(0, 0).unwrap().next, Event::Splitting);
        assert_eq!(net.node(1, 1).unwrap().pre, Event::None);
        assert_eq!(net.to_record().edges.len(), 2);
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(MetaNode::parse_label("T12C3"), Some((12, 3)));
        assert_eq!(MetaNode::parse_label("C3T12"), None);
        assert_eq!(MetaNode::new(4, 7).to_string(), "T4C7");
    }

    #[test]
    fn test_length_mismatch() {
        let partitions = vec![partition(&[&[1, 2, 3]])];
        let err = MetaNetwork::build(&partitions, &[], &Ged::default()).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }
}
