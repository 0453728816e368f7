//! Communities, partitions and social positions.
//!
//! A community is a set of node ids inside exactly one snapshot. Detection
//! itself happens elsewhere (see [`CommunityDetection`]); this module only
//! holds its output and enforces the minimum size:
//!
//! ```text
//! detector ──▶ [[a,b,c,d], [e,f], [g,h,i]] ──Partition::from_groups──▶ C0={a,b,c,d}, C1={g,h,i}
//! ```
//!
//! Groups smaller than [`MIN_COMMUNITY_SIZE`] are too small for the
//! size-dependent descriptors (leadership, cohesion) and are dropped.
//!
//! A [`SocialPosition`] maps each node of a snapshot to an importance score,
//! typically PageRank. It is consumed as-is.

mod traits;

pub use traits::{CommunityDetection, SocialPositionScorer};

use crate::error::{Error, Result};
use crate::record::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Smallest community kept by [`Partition::from_groups`].
pub const MIN_COMMUNITY_SIZE: usize = 3;

/// A node-id set within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<NodeId>", into = "Vec<NodeId>")]
pub struct Community {
    members: Vec<NodeId>,
    lookup: HashSet<NodeId>,
}

impl Community {
    /// Create a community, dropping duplicate members (first occurrence wins).
    pub fn new(members: impl IntoIterator<Item = NodeId>) -> Self {
        let mut lookup = HashSet::new();
        let members = members
            .into_iter()
            .filter(|m| lookup.insert(m.clone()))
            .collect();
        Self { members, lookup }
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the community has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains(id)
    }

    /// Members shared with `other`, in this community's order.
    pub fn intersection<'a>(&'a self, other: &'a Community) -> impl Iterator<Item = &'a NodeId> {
        self.members.iter().filter(move |m| other.contains(m))
    }
}

impl From<Vec<NodeId>> for Community {
    fn from(members: Vec<NodeId>) -> Self {
        Self::new(members)
    }
}

impl From<Community> for Vec<NodeId> {
    fn from(community: Community) -> Self {
        community.members
    }
}

impl<S: Into<NodeId>> FromIterator<S> for Community {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into))
    }
}

/// The retained communities of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Communities; the position is the community index.
    pub communities: Vec<Community>,
}

impl Partition {
    /// Keep groups with at least [`MIN_COMMUNITY_SIZE`] distinct members.
    pub fn from_groups(groups: impl IntoIterator<Item = Vec<NodeId>>) -> Self {
        Self::from_groups_with_min(groups, MIN_COMMUNITY_SIZE)
    }

    /// Keep groups with at least `min_size` distinct members.
    ///
    /// `min_size` below [`MIN_COMMUNITY_SIZE`] is raised to it.
    pub fn from_groups_with_min(
        groups: impl IntoIterator<Item = Vec<NodeId>>,
        min_size: usize,
    ) -> Self {
        let min_size = min_size.max(MIN_COMMUNITY_SIZE);
        let communities = groups
            .into_iter()
            .map(Community::new)
            .filter(|c| c.len() >= min_size)
            .collect();
        Self { communities }
    }

    /// Number of communities.
    pub fn len(&self) -> usize {
        self.communities.len()
    }

    /// Whether there are no communities.
    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    /// Community at `index`.
    pub fn get(&self, index: usize) -> Option<&Community> {
        self.communities.get(index)
    }

    /// Iterate over communities.
    pub fn iter(&self) -> std::slice::Iter<'_, Community> {
        self.communities.iter()
    }
}

/// Per-snapshot node importance scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocialPosition(HashMap<NodeId, f64>);

impl SocialPosition {
    /// Wrap a score map.
    pub fn new(scores: HashMap<NodeId, f64>) -> Self {
        Self(scores)
    }

    /// The same score for every id.
    pub fn uniform<'a>(ids: impl IntoIterator<Item = &'a str>, score: f64) -> Self {
        Self(ids.into_iter().map(|id| (id.to_string(), score)).collect())
    }

    /// Score of a node.
    pub fn get(&self, id: &str) -> Option<f64> {
        self.0.get(id).copied()
    }

    /// Score of a node, failing with [`Error::MissingScore`].
    pub fn score(&self, id: &str) -> Result<f64> {
        self.get(id).ok_or_else(|| Error::MissingScore(id.to_string()))
    }

    /// Scores of every community member, in member order.
    pub fn scores_of(&self, community: &Community) -> Result<Vec<f64>> {
        community.members().iter().map(|m| self.score(m)).collect()
    }

    /// Number of scored nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no node is scored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<NodeId>> FromIterator<(S, f64)> for SocialPosition {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
