//! Linear time decay of edge contributions.
//!
//! Each historical edge contributes `initial_weight / max(age / decay_rate, 1)`
//! to its pair's weight. Once the edge is older than `max_decay` decay
//! periods, decay returns [`REMOVE`] and the pair's edge is dropped.
//!
//! ```text
//! weight
//!   w0 ┤━━━━━┓
//!      │     ┗━━━╮
//! w0/2 ┤         ╰──╮
//!      │            ╰────────────╮
//!    0 ┼─────┬─────┬─────────────┴──▶ age
//!         rate  2·rate      max_decay·rate
//! ```
//!
//! Stable relations (exit, conflict, join, acquisition, membership,
//! structural) never decay and always contribute their initial weight.

use crate::error::{Error, Result};
use crate::record::RelationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel returned by [`DecayConfig::decay`] when the edge must be removed.
pub const REMOVE: f64 = -1.0;

/// Decay parameters and the per-relation weight table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Length of one decay period, in days.
    pub decay_rate: f64,
    /// Number of decay periods after which an edge is removed.
    pub max_decay: f64,
    /// Initial weight for relations missing from `initial_weights`.
    pub default_weight: f64,
    /// Initial weight per relation.
    pub initial_weights: BTreeMap<RelationKind, f64>,
    /// Relations that never decay.
    pub stable: BTreeSet<RelationKind>,
}

impl Default for DecayConfig {
    fn default() -> Self {
        let initial_weights = [
            (RelationKind::Exit, -1.0),
            (RelationKind::Conflict, -1.0),
            (RelationKind::Join, 4.0),
            (RelationKind::Acquisition, 4.0),
            (RelationKind::Membership, 2.0),
            (RelationKind::Structural, 2.0),
        ]
        .into_iter()
        .collect();
        let stable = [
            RelationKind::Exit,
            RelationKind::Conflict,
            RelationKind::Join,
            RelationKind::Acquisition,
            RelationKind::Membership,
            RelationKind::Structural,
        ]
        .into_iter()
        .collect();
        Self {
            decay_rate: 30.0,
            max_decay: 12.0,
            default_weight: 2.5,
            initial_weights,
            stable,
        }
    }
}

impl DecayConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the decay period length (days).
    pub fn with_decay_rate(mut self, days: f64) -> Self {
        self.decay_rate = days;
        self
    }

    /// Set the number of periods before removal.
    pub fn with_max_decay(mut self, periods: f64) -> Self {
        self.max_decay = periods;
        self
    }

    /// Set the fallback initial weight.
    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight;
        self
    }

    /// Override the initial weight of one relation.
    pub fn with_initial_weight(mut self, relation: RelationKind, weight: f64) -> Self {
        let _ = self.initial_weights.insert(relation, weight);
        self
    }

    /// Check parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_rate > 0.0) {
            return Err(Error::InvalidParameter {
                name: "decay_rate",
                message: "must be positive",
            });
        }
        if !(self.max_decay >= 1.0) {
            return Err(Error::InvalidParameter {
                name: "max_decay",
                message: "must be at least one period",
            });
        }
        Ok(())
    }

    /// Initial weight of a relation.
    pub fn initial_weight(&self, relation: RelationKind) -> f64 {
        self.initial_weights
            .get(&relation)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Contribution of an edge of `relation` that is `age_days` old.
    ///
    /// Negative results mean "remove the pair's edge".
    pub fn decay(&self, relation: RelationKind, age_days: f64) -> f64 {
        let weight = self.initial_weight(relation);
        if self.stable.contains(&relation) {
            return weight;
        }
        let coefficient = (age_days / self.decay_rate).max(1.0);
        if coefficient > self.max_decay {
            return REMOVE;
        }
        weight / coefficient
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stable_relation_never_decays() {
        let cfg = DecayConfig::default();
        for relation in [RelationKind::Join, RelationKind::Structural, RelationKind::Exit] {
            assert_eq!(cfg.decay(relation, 0.0), cfg.decay(relation, 10_000.0));
        }
        assert_eq!(cfg.decay(RelationKind::Join, 10_000.0), 4.0);
    }

    #[test]
    fn test_negative_stable_weight_removes() {
        let cfg = DecayConfig::default();
        assert!(cfg.decay(RelationKind::Conflict, 5.0) < 0.0);
    }

    #[test]
    fn test_unknown_relation_uses_default_weight() {
        let cfg = DecayConfig::default();
        assert_eq!(cfg.decay(RelationKind::Other, 0.0), 2.5);
        assert_eq!(cfg.decay(RelationKind::Other, 60.0), 1.25);
    }

    #[test]
    fn test_removal_after_max_decay() {
        let cfg = DecayConfig::default();
        // 12 periods of 30 days is the last day with a contribution
        assert!(cfg.decay(RelationKind::Other, 360.0) > 0.0);
        assert_eq!(cfg.decay(RelationKind::Other, 361.0), REMOVE);
    }

    #[test]
    fn test_validate() {
        assert!(DecayConfig::default().validate().is_ok());
        assert!(DecayConfig::default().with_decay_rate(0.0).validate().is_err());
        assert!(DecayConfig::default().with_max_decay(0.5).validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let cfg: DecayConfig =
            serde_json::from_str(r#"{"decay_rate": 7.0, "initial_weights": {"other": 1.0}}"#)
                .unwrap();
        assert_eq!(cfg.decay_rate, 7.0);
        assert_eq!(cfg.max_decay, 12.0);
        assert_eq!(cfg.initial_weight(RelationKind::Other), 1.0);
    }

    proptest! {
        #[test]
        fn decay_strictly_decreases_past_first_period(
            a in 30.0f64..360.0,
            delta in 0.5f64..200.0,
        ) {
            let cfg = DecayConfig::default();
            let b = a + delta;
            let wa = cfg.decay(RelationKind::Other, a);
            let wb = cfg.decay(RelationKind::Other, b);
            if b <= 360.0 {
                prop_assert!(wb < wa);
            } else {
                prop_assert_eq!(wb, REMOVE);
            }
        }
    }
}
