//! End-to-end orchestration.
//!
//! ```text
//! records ─▶ snapshots ─▶ partitions + positions ─▶ features
//!                                    │                  │
//!                                    ▼                  ▼
//!                               meta network ─────▶ dataset
//! ```
//!
//! Every stage is also exposed on its own, taking the previous stage's typed
//! output. Checkpointing between stages is left to the caller; every stage
//! result derives serde traits (snapshots through [`crate::SnapshotRecord`]).

use crate::community::{
    CommunityDetection, Partition, SocialPosition, SocialPositionScorer, MIN_COMMUNITY_SIZE,
};
use crate::error::{Error, Result};
use crate::features::{FeatureConfig, FeatureExtractor, FeatureVector};
use crate::ged::Ged;
use crate::meta::MetaNetwork;
use crate::record::{EdgeRecord, NodeKind, NodeRecord};
use crate::sample::{Dataset, SampleAssembler, SampleConfig};
use crate::snapshot::{DecayConfig, SnapshotBuilder, SnapshotSeries, Window};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings for every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Snapshot end dates.
    pub window: Window,
    /// Edge weighting and decay.
    pub decay: DecayConfig,
    /// Node kinds left out of snapshots.
    pub excluded_kinds: Vec<NodeKind>,
    /// Smallest community kept; never below [`MIN_COMMUNITY_SIZE`].
    pub min_community_size: usize,
    /// Community descriptors.
    pub features: FeatureConfig,
    /// Event classification thresholds.
    pub ged: Ged,
    /// Sample assembly and split.
    pub sample: SampleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: Window::default(),
            decay: DecayConfig::default(),
            excluded_kinds: vec![NodeKind::Event],
            min_community_size: MIN_COMMUNITY_SIZE,
            features: FeatureConfig::default(),
            ged: Ged::default(),
            sample: SampleConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the snapshot window.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Set decay parameters.
    pub fn with_decay(mut self, decay: DecayConfig) -> Self {
        self.decay = decay;
        self
    }

    /// Set excluded node kinds.
    pub fn with_excluded_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.excluded_kinds = kinds.into_iter().collect();
        self
    }

    /// Set the minimum community size.
    pub fn with_min_community_size(mut self, size: usize) -> Self {
        self.min_community_size = size;
        self
    }

    /// Set feature settings.
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    /// Set GED thresholds.
    pub fn with_ged(mut self, ged: Ged) -> Self {
        self.ged = ged;
        self
    }

    /// Set sample settings.
    pub fn with_sample(mut self, sample: SampleConfig) -> Self {
        self.sample = sample;
        self
    }

    /// Check every stage's parameters up front.
    pub fn validate(&self) -> Result<()> {
        self.decay.validate()?;
        self.ged.validate()?;
        self.sample.validate()?;
        if self.window.size_days <= 0 {
            return Err(Error::InvalidParameter {
                name: "window_size",
                message: "must be at least one day",
            });
        }
        Ok(())
    }
}

/// Partitions and positions of every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Communities {
    /// Retained communities, one partition per snapshot.
    pub partitions: Vec<Partition>,
    /// Social positions, one map per snapshot.
    pub positions: Vec<SocialPosition>,
}

/// Results of every stage.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Snapshots and their labels.
    pub series: SnapshotSeries,
    /// Retained communities per snapshot.
    pub partitions: Vec<Partition>,
    /// Social positions per snapshot.
    pub positions: Vec<SocialPosition>,
    /// `features[s][c]` describes community `c` of snapshot `s`.
    pub features: Vec<Vec<FeatureVector>>,
    /// Meta-community evolution network.
    pub network: MetaNetwork,
    /// Labelled samples, split.
    pub dataset: Dataset,
}

/// Runs the stages in order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline with the given settings.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the snapshot series.
    pub fn snapshots(&self, nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Result<SnapshotSeries> {
        SnapshotBuilder::new()
            .with_decay(self.config.decay.clone())
            .with_excluded_kinds(self.config.excluded_kinds.iter().copied())
            .generate(&self.config.window, nodes, edges)
    }

    /// Detect and score communities in every snapshot.
    ///
    /// Collaborator failures carry the snapshot index.
    pub fn communities(
        &self,
        series: &SnapshotSeries,
        detector: &impl CommunityDetection,
        scorer: &impl SocialPositionScorer,
    ) -> Result<Communities> {
        let mut out = Communities::default();
        for (s, snapshot) in series.iter().enumerate() {
            let groups = detector.partition(snapshot).map_err(|e| e.in_snapshot(s))?;
            let found = groups.len();
            let partition = Partition::from_groups_with_min(groups, self.config.min_community_size);
            let positions = scorer.score(snapshot).map_err(|e| e.in_snapshot(s))?;
            debug!(
                snapshot = s,
                found,
                kept = partition.len(),
                "communities detected"
            );
            out.partitions.push(partition);
            out.positions.push(positions);
        }
        info!(
            snapshots = series.len(),
            communities = out.partitions.iter().map(Partition::len).sum::<usize>(),
            "community detection done"
        );
        Ok(out)
    }

    /// Describe every community.
    pub fn features(
        &self,
        series: &SnapshotSeries,
        communities: &Communities,
    ) -> Result<Vec<Vec<FeatureVector>>> {
        let extractor = FeatureExtractor::new(self.config.features.clone());
        let out = extractor.extract_all(
            &series.snapshots,
            &communities.partitions,
            &communities.positions,
        )?;
        info!(
            vectors = out.iter().map(Vec::len).sum::<usize>(),
            "features extracted"
        );
        Ok(out)
    }

    /// Classify transitions into the meta-community network.
    pub fn network(&self, communities: &Communities) -> Result<MetaNetwork> {
        MetaNetwork::build(
            &communities.partitions,
            &communities.positions,
            &self.config.ged,
        )
    }

    /// Assemble and split samples.
    pub fn dataset(
        &self,
        network: &MetaNetwork,
        features: &[Vec<FeatureVector>],
    ) -> Result<Dataset> {
        SampleAssembler::new(self.config.sample.clone()).assemble(network, features)
    }

    /// Run every stage.
    pub fn run(
        &self,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
        detector: &impl CommunityDetection,
        scorer: &impl SocialPositionScorer,
    ) -> Result<PipelineOutput> {
        self.config.validate()?;
        let series = self.snapshots(nodes, edges)?;
        let communities = self.communities(&series, detector, scorer)?;
        let features = self.features(&series, &communities)?;
        let network = self.network(&communities)?;
        let dataset = self.dataset(&network, &features)?;
        info!(
            snapshots = series.len(),
            meta_nodes = network.node_count(),
            samples = dataset.len(),
            "pipeline finished"
        );
        let Communities {
            partitions,
            positions,
        } = communities;
        Ok(PipelineOutput {
            series,
            partitions,
            positions,
            features,
            network,
            dataset,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::NodeId;
    use crate::snapshot::Snapshot;

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "window": {"start": "2018-01-01", "size_days": 7, "cutoff": "2018-02-01"},
            "ged": {"alpha": 0.4},
            "sample": {"relative": true}
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window.size_days, 7);
        assert_eq!(config.window.end_times().unwrap().len(), 5);
        assert_eq!(config.ged.alpha, 0.4);
        assert_eq!(config.ged.beta, 0.6);
        assert!(config.sample.relative);
        assert_eq!(config.sample.path_length, 4);
        assert_eq!(config.excluded_kinds, vec![NodeKind::Event]);
    }

    #[test]
    fn test_collaborator_error_has_snapshot() {
        let nodes = vec![NodeRecord::new("a", NodeKind::Stakeholder)];
        let window = Window::new(
            crate::record::parse_date("2018-01-01").unwrap(),
            30,
            crate::record::parse_date("2018-03-01").unwrap(),
        );
        let pipeline = Pipeline::new(PipelineConfig::default().with_window(window));
        let series = pipeline.snapshots(&nodes, &[]).unwrap();
        assert_eq!(series.len(), 2);

        let detector = |_: &Snapshot| -> Result<Vec<Vec<NodeId>>> {
            Err(Error::Collaborator("louvain diverged".into()))
        };
        let scorer = |s: &Snapshot| -> Result<SocialPosition> {
            Ok(SocialPosition::uniform(s.node_ids(), 1.0))
        };
        let err = pipeline.communities(&series, &detector, &scorer).unwrap_err();
        assert!(matches!(err, Error::Snapshot { snapshot: 0, .. }));
    }

    #[test]
    fn test_invalid_window_rejected() {
        let mut config = PipelineConfig::default();
        config.window.size_days = 0;
        let pipeline = Pipeline::new(config);
        let scorer = |s: &Snapshot| -> Result<SocialPosition> {
            Ok(SocialPosition::uniform(s.node_ids(), 1.0))
        };
        let detector = |_: &Snapshot| -> Result<Vec<Vec<NodeId>>> { Ok(vec![]) };
        assert!(pipeline.run(&[], &[], &detector, &scorer).is_err());
    }
}
