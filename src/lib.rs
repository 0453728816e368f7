//! # cevo
//!
//! Community evolution tracking over time-decayed relationship graphs.
//!
//! Raw node/edge records become a series of weighted snapshots; communities
//! detected in each snapshot are described by structural features and linked
//! across snapshots by GED (Group Evolution Discovery) events; short
//! evolution paths through the resulting network become labelled samples
//! for event prediction.
//!
//! Community detection and social-position scoring are supplied by the
//! caller through [`CommunityDetection`] and [`SocialPositionScorer`].
//! With the `parallel` feature, snapshot generation and feature extraction
//! run on rayon; results are identical either way.

pub mod community;
/// Error types used across `cevo`.
pub mod error;
pub mod features;
pub mod ged;
pub mod meta;
pub mod pipeline;
pub mod record;
pub mod sample;
pub mod snapshot;

pub use community::{
    Community, CommunityDetection, Partition, SocialPosition, SocialPositionScorer,
};
pub use error::{Error, Result};
pub use features::{FeatureConfig, FeatureExtractor, FeatureVector};
pub use ged::{Event, Ged, Relation};
pub use meta::{MetaNetwork, MetaNode};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput};
pub use record::{EdgeRecord, NodeId, NodeKind, NodeRecord, RelationKind};
pub use sample::{Dataset, Sample, SampleAssembler, SampleConfig};
pub use snapshot::{
    DecayConfig, Snapshot, SnapshotBuilder, SnapshotRecord, SnapshotSeries, Window,
};
