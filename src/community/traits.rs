//! Collaborator traits for community detection and social-position scoring.
//!
//! Both are implemented outside this crate (Louvain, PageRank, ...). Any
//! closure with the matching signature also implements them.

use super::SocialPosition;
use crate::error::Result;
use crate::record::NodeId;
use crate::snapshot::Snapshot;

/// Partitions a snapshot into groups of node ids.
pub trait CommunityDetection {
    /// Detect communities in a snapshot.
    ///
    /// Groups of any size may be returned; callers discard the small ones.
    fn partition(&self, snapshot: &Snapshot) -> Result<Vec<Vec<NodeId>>>;
}

/// Scores every node of a snapshot by importance.
pub trait SocialPositionScorer {
    /// Score all nodes of a snapshot.
    fn score(&self, snapshot: &Snapshot) -> Result<SocialPosition>;
}

impl<F> CommunityDetection for F
where
    F: Fn(&Snapshot) -> Result<Vec<Vec<NodeId>>>,
{
    fn partition(&self, snapshot: &Snapshot) -> Result<Vec<Vec<NodeId>>> {
        self(snapshot)
    }
}

impl<F> SocialPositionScorer for F
where
    F: Fn(&Snapshot) -> Result<SocialPosition>,
{
    fn score(&self, snapshot: &Snapshot) -> Result<SocialPosition> {
        self(snapshot)
    }
}
