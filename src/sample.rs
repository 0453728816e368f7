//! Supervised samples from evolution paths.
//!
//! A sample is a short walk through the meta-community network: the
//! features of three consecutive communities, labelled by the most severe
//! event at the end of the walk.
//!
//! ```text
//! T0C2 ──▶ T1C0 ──▶ T2C1 ──▶ T3C4
//! [ f  ]   [ f  ]   [ f  ]
//!                    next ─┐   pre ─┐
//!                          label = max(0, next, pre)
//! ```
//!
//! Walks are the shortest paths (at most `path_length` hops) between every
//! ordered pair of meta-nodes. A walk qualifies when it has exactly
//! `path_length` nodes, or one fewer and ends in a dissolving community.

use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::ged::Event;
use crate::meta::MetaNetwork;
use petgraph::graph::NodeIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Sample assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Nodes in a full path; also the hop cutoff of the path search.
    pub path_length: usize,
    /// Report later steps as percentage change over the previous step.
    pub relative: bool,
    /// Fraction of samples held out for testing.
    pub test_ratio: f64,
    /// Shuffle seed for the split.
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            path_length: 4,
            relative: false,
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl SampleConfig {
    /// Set the path length.
    pub fn with_path_length(mut self, nodes: usize) -> Self {
        self.path_length = nodes;
        self
    }

    /// Enable or disable relative features.
    pub fn with_relative(mut self, relative: bool) -> Self {
        self.relative = relative;
        self
    }

    /// Set the held-out fraction.
    pub fn with_test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio;
        self
    }

    /// Set the split seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check parameters.
    pub fn validate(&self) -> Result<()> {
        if self.path_length < 2 {
            return Err(Error::InvalidParameter {
                name: "path_length",
                message: "must be at least 2",
            });
        }
        if !(0.0..=1.0).contains(&self.test_ratio) {
            return Err(Error::InvalidParameter {
                name: "test_ratio",
                message: "must be in [0, 1]",
            });
        }
        Ok(())
    }
}

/// One labelled walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// `(snapshot, community)` of every node on the walk.
    pub path: Vec<(usize, usize)>,
    /// Concatenated features of the first `path_length - 1` communities.
    pub features: Vec<f64>,
    /// Event severity code.
    pub label: u8,
}

/// Train/test split of the samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Training samples.
    pub train: Vec<Sample>,
    /// Held-out samples.
    pub test: Vec<Sample>,
}

impl Dataset {
    /// Training feature matrix.
    pub fn train_x(&self) -> Vec<Vec<f64>> {
        self.train.iter().map(|s| s.features.clone()).collect()
    }

    /// Training labels.
    pub fn train_y(&self) -> Vec<u8> {
        self.train.iter().map(|s| s.label).collect()
    }

    /// Test feature matrix.
    pub fn test_x(&self) -> Vec<Vec<f64>> {
        self.test.iter().map(|s| s.features.clone()).collect()
    }

    /// Test labels.
    pub fn test_y(&self) -> Vec<u8> {
        self.test.iter().map(|s| s.label).collect()
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns a meta-community network into a labelled dataset.
#[derive(Debug, Clone, Default)]
pub struct SampleAssembler {
    config: SampleConfig,
}

impl SampleAssembler {
    /// Assembler with the given settings.
    pub fn new(config: SampleConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    /// Column names of a sample row, given one community's column names.
    pub fn column_names(&self, feature_names: &[String]) -> Vec<String> {
        (1..self.config.path_length)
            .flat_map(|step| feature_names.iter().map(move |n| format!("{step}-{n}")))
            .collect()
    }

    /// Shortest paths of at most `path_length` hops from every node.
    ///
    /// Sources come in node order, targets in breadth-first discovery order
    /// (successors visited in edge-insertion order). Each source's trivial
    /// one-node path is included.
    pub fn shortest_paths(&self, network: &MetaNetwork) -> Vec<Vec<NodeIndex>> {
        let n = network.node_count();
        let mut out = Vec::new();
        for source in network.graph().node_indices() {
            let mut paths: Vec<Option<Vec<NodeIndex>>> = vec![None; n];
            paths[source.index()] = Some(vec![source]);
            let mut discovered = vec![source];
            let mut frontier = vec![source];
            let mut hops = 0;
            while !frontier.is_empty() && hops < self.config.path_length {
                let mut next = Vec::new();
                for v in frontier {
                    for w in network.successors(v) {
                        if paths[w.index()].is_some() {
                            continue;
                        }
                        let mut path = paths[v.index()].clone().unwrap_or_default();
                        path.push(w);
                        paths[w.index()] = Some(path);
                        discovered.push(w);
                        next.push(w);
                    }
                }
                frontier = next;
                hops += 1;
            }
            out.extend(discovered.into_iter().filter_map(|t| paths[t.index()].take()));
        }
        out
    }

    /// Whether a path is a sample.
    pub fn qualifies(&self, network: &MetaNetwork, path: &[NodeIndex]) -> bool {
        let full = self.config.path_length;
        if path.len() == full {
            return true;
        }
        match path.last() {
            Some(&last) if path.len() + 1 == full => {
                network.graph()[last].next == Event::Dissolving
            }
            _ => false,
        }
    }

    /// Build a sample from a qualifying path.
    pub fn sample(
        &self,
        network: &MetaNetwork,
        path: &[NodeIndex],
        features: &[Vec<FeatureVector>],
    ) -> Result<Sample> {
        self.config.validate()?;
        let graph = network.graph();
        let steps = self.config.path_length - 1;

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(steps);
        for &idx in path.iter().take(steps) {
            let node = &graph[idx];
            let fv = features
                .get(node.snapshot)
                .and_then(|s| s.get(node.community))
                .ok_or(Error::MissingFeatures {
                    snapshot: node.snapshot,
                    community: node.community,
                })?;
            rows.push(fv.to_vec());
        }

        let mut label = Event::None.code();
        if let Some(&idx) = path.get(steps - 1) {
            label = label.max(graph[idx].next.code());
        }
        if let Some(&idx) = path.get(steps) {
            label = label.max(graph[idx].pre.code());
        }

        let features = if self.config.relative {
            relative(&rows)
        } else {
            rows.concat()
        };
        Ok(Sample {
            path: path
                .iter()
                .map(|&idx| (graph[idx].snapshot, graph[idx].community))
                .collect(),
            features,
            label,
        })
    }

    /// Every qualifying sample, in path order.
    pub fn samples(
        &self,
        network: &MetaNetwork,
        features: &[Vec<FeatureVector>],
    ) -> Result<Vec<Sample>> {
        self.config.validate()?;
        self.shortest_paths(network)
            .iter()
            .filter(|p| self.qualifies(network, p))
            .map(|p| self.sample(network, p, features))
            .collect()
    }

    /// Seeded shuffle, then hold out `ceil(n · test_ratio)` samples.
    pub fn split(&self, samples: Vec<Sample>) -> Dataset {
        let n = samples.len();
        let n_test = ((n as f64) * self.config.test_ratio).ceil() as usize;
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        order.shuffle(&mut rng);

        let mut slots: Vec<Option<Sample>> = samples.into_iter().map(Some).collect();
        let mut take = |i: usize| slots[i].take();
        let test: Vec<Sample> = order[..n_test.min(n)].iter().filter_map(|&i| take(i)).collect();
        let train: Vec<Sample> = order[n_test.min(n)..].iter().filter_map(|&i| take(i)).collect();
        Dataset { train, test }
    }

    /// Assemble and split.
    pub fn assemble(
        &self,
        network: &MetaNetwork,
        features: &[Vec<FeatureVector>],
    ) -> Result<Dataset> {
        let samples = self.samples(network, features)?;
        let dataset = self.split(samples);
        info!(
            train = dataset.train.len(),
            test = dataset.test.len(),
            "samples assembled"
        );
        Ok(dataset)
    }
}

/// First row as-is, later rows as percentage change over the row before.
///
/// A zero previous value reports `value · 100`.
fn relative(rows: &[Vec<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(rows.iter().map(Vec::len).sum());
    for (step, row) in rows.iter().enumerate() {
        if step == 0 {
            out.extend_from_slice(row);
            continue;
        }
        let prev = &rows[step - 1];
        out.extend(row.iter().zip(prev).map(|(&x2, &x1)| {
            if x1 != 0.0 {
                (x2 - x1) / x1 * 100.0
            } else {
                x2 * 100.0
            }
        }));
    }
    out
}
