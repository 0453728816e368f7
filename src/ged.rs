//! Group Evolution Discovery (GED).
//!
//! Decides how a community of snapshot `t` relates to a community of
//! snapshot `t + 1` from two asymmetric inclusion scores:
//!
//! ```text
//!              |C1 ∩ C2|     Σ_{x ∈ C1 ∩ C2} SP1(x)
//! I(C1, C2) = ─────────── · ────────────────────────
//!                |C1|          Σ_{x ∈ C1} SP1(x)
//! ```
//!
//! The first factor is how much of C1's membership survives in C2, the
//! second how much of C1's importance does. With `I1 = I(C1, C2)` and
//! `I2 = I(C2, C1)` the pair relation is the first rule that matches:
//!
//! | # | Relation | Condition |
//! |---|----------|-----------|
//! | 1 | continuing | I1 ≥ α, I2 ≥ β, \|C1\| = \|C2\| |
//! | 2 | shrinking | I1 ≥ α, I2 ≥ β, \|C1\| > \|C2\|; or I1 < α, I2 ≥ β, \|C1\| ≥ \|C2\| |
//! | 3 | growing | I1 > α, I2 > β, \|C1\| < \|C2\|; or I1 ≥ α, I2 < β, \|C1\| ≤ \|C2\| |
//! | 4 | splitting | I1 < α, I2 ≥ β, \|C1\| ≥ \|C2\| |
//! | 5 | merging | I1 ≥ α, I2 ≤ β, \|C1\| ≤ \|C2\| |
//!
//! Rule 4 is shadowed by rule 2 and is kept for fidelity to the published
//! rule set. Pairs matching nothing have no relation.
//!
//! Per community, the relations are then folded into a single event:
//! outgoing relations give the community's next event (dissolving,
//! shrinking, continuing, splitting), incoming relations give its previous
//! event (forming, growing, merging). A lone relation of any other kind
//! yields no event.
//!
//! ## References
//!
//! Bródka, Saganowski, Kazienko (2013). "GED: the method for group evolution
//! discovery in social networks." Social Network Analysis and Mining 3, 1-14.

use crate::community::{Community, Partition, SocialPosition};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Relation between one community pair of consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Continuing,
    Shrinking,
    Growing,
    Splitting,
    Merging,
}

impl Relation {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Continuing => "continuing",
            Relation::Shrinking => "shrinking",
            Relation::Growing => "growing",
            Relation::Splitting => "splitting",
            Relation::Merging => "merging",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event label attached to a community.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    /// No significant event.
    #[default]
    None,
    Continuing,
    Growing,
    Shrinking,
    Splitting,
    Merging,
    Dissolving,
    Forming,
}

impl Event {
    /// Severity code used as the sample label.
    pub fn code(&self) -> u8 {
        match self {
            Event::None => 0,
            Event::Continuing => 1,
            Event::Growing => 2,
            Event::Shrinking => 3,
            Event::Splitting => 4,
            Event::Merging => 5,
            Event::Dissolving => 6,
            Event::Forming => 7,
        }
    }

    /// Inverse of [`Event::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Event::None,
            1 => Event::Continuing,
            2 => Event::Growing,
            3 => Event::Shrinking,
            4 => Event::Splitting,
            5 => Event::Merging,
            6 => Event::Dissolving,
            7 => Event::Forming,
            _ => return None,
        })
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::None => "none",
            Event::Continuing => "continuing",
            Event::Growing => "growing",
            Event::Shrinking => "shrinking",
            Event::Splitting => "splitting",
            Event::Merging => "merging",
            Event::Dissolving => "dissolving",
            Event::Forming => "forming",
        }
    }

    /// All events, in code order.
    pub const ALL: [Event; 8] = [
        Event::None,
        Event::Continuing,
        Event::Growing,
        Event::Shrinking,
        Event::Splitting,
        Event::Merging,
        Event::Dissolving,
        Event::Forming,
    ];
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusion of `c1` in `c2`, weighted by `c1`'s social positions.
///
/// Fails with [`Error::DegenerateInput`] when `c1` carries no positional mass.
pub fn inclusion(c1: &Community, c2: &Community, sp1: &SocialPosition) -> Result<f64> {
    if c1.is_empty() {
        return Err(Error::DegenerateInput("inclusion of an empty community"));
    }
    let total: f64 = sp1.scores_of(c1)?.iter().sum();
    if total == 0.0 {
        return Err(Error::DegenerateInput("zero social-position mass"));
    }

    let mut shared = 0usize;
    let mut retained = 0.0;
    for member in c1.intersection(c2) {
        shared += 1;
        retained += sp1.score(member)?;
    }
    let quantity = shared as f64 / c1.len() as f64;
    Ok(quantity * (retained / total))
}

/// Apply the ordered rule table to precomputed inclusions and sizes.
pub fn classify_scores(i1: f64, i2: f64, n1: usize, n2: usize, alpha: f64, beta: f64) -> Option<Relation> {
    if i1 >= alpha && i2 >= beta && n1 == n2 {
        return Some(Relation::Continuing);
    }
    if (i1 >= alpha && i2 >= beta && n1 > n2) || (i1 < alpha && i2 >= beta && n1 >= n2) {
        return Some(Relation::Shrinking);
    }
    if (i1 > alpha && i2 > beta && n1 < n2) || (i1 >= alpha && i2 < beta && n1 <= n2) {
        return Some(Relation::Growing);
    }
    if i1 < alpha && i2 >= beta && n1 >= n2 {
        return Some(Relation::Splitting);
    }
    if i1 >= alpha && i2 <= beta && n1 <= n2 {
        return Some(Relation::Merging);
    }
    None
}

/// Next event of a source community from its outgoing relations.
pub fn aggregate_outgoing(relations: &[Relation]) -> Event {
    match relations {
        [] => Event::Dissolving,
        [Relation::Shrinking] => Event::Shrinking,
        [Relation::Continuing] => Event::Continuing,
        [_] => Event::None,
        _ => Event::Splitting,
    }
}

/// Previous event of a target community from its incoming relations.
pub fn aggregate_incoming(relations: &[Relation]) -> Event {
    match relations {
        [] => Event::Forming,
        [Relation::Growing] => Event::Growing,
        [_] => Event::None,
        _ => Event::Merging,
    }
}

/// One recorded pair relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRelation {
    /// Community index in the earlier snapshot.
    pub from: usize,
    /// Community index in the later snapshot.
    pub to: usize,
    /// Classified relation.
    pub relation: Relation,
}

/// Relations between two consecutive partitions, with per-community bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transitions {
    /// Every recorded pair, in `(from, to)` order.
    pub pairs: Vec<PairRelation>,
    /// Outgoing relations per source community, in target order.
    pub outgoing: Vec<Vec<Relation>>,
    /// Incoming relations per target community, in source order.
    pub incoming: Vec<Vec<Relation>>,
}

impl Transitions {
    /// Next event of each source community.
    pub fn next_events(&self) -> Vec<Event> {
        self.outgoing.iter().map(|r| aggregate_outgoing(r)).collect()
    }

    /// Previous event of each target community.
    pub fn pre_events(&self) -> Vec<Event> {
        self.incoming.iter().map(|r| aggregate_incoming(r)).collect()
    }
}

/// GED classifier with its two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ged {
    /// Threshold on the forward inclusion `I(C1, C2)`.
    pub alpha: f64,
    /// Threshold on the backward inclusion `I(C2, C1)`.
    pub beta: f64,
}

impl Default for Ged {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.6,
        }
    }
}

impl Ged {
    /// Classifier with explicit thresholds.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Set alpha.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set beta.
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Check that both thresholds lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidParameter {
                name: "alpha",
                message: "must be in [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(Error::InvalidParameter {
                name: "beta",
                message: "must be in [0, 1]",
            });
        }
        Ok(())
    }

    /// Relation between `c1` (earlier) and `c2` (later), if any.
    pub fn classify(
        &self,
        c1: &Community,
        c2: &Community,
        sp1: &SocialPosition,
        sp2: &SocialPosition,
    ) -> Result<Option<Relation>> {
        let i1 = inclusion(c1, c2, sp1)?;
        let i2 = inclusion(c2, c1, sp2)?;
        Ok(classify_scores(i1, i2, c1.len(), c2.len(), self.alpha, self.beta))
    }

    /// Classify the full cross product of two consecutive partitions.
    ///
    /// `snapshot` is the index of the earlier partition; it only feeds
    /// error context.
    pub fn transitions(
        &self,
        snapshot: usize,
        earlier: &Partition,
        later: &Partition,
        sp1: &SocialPosition,
        sp2: &SocialPosition,
    ) -> Result<Transitions> {
        let pairs: Vec<(usize, usize)> = (0..earlier.len())
            .flat_map(|i| (0..later.len()).map(move |j| (i, j)))
            .collect();

        let one = |&(i, j): &(usize, usize)| -> Result<Option<PairRelation>> {
            let relation = self
                .classify(&earlier.communities[i], &later.communities[j], sp1, sp2)
                .map_err(|e| e.in_transition(snapshot, i, j))?;
            Ok(relation.map(|relation| PairRelation {
                from: i,
                to: j,
                relation,
            }))
        };

        #[cfg(feature = "parallel")]
        let found: Vec<Option<PairRelation>> =
            pairs.par_iter().map(one).collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let found: Vec<Option<PairRelation>> = pairs.iter().map(one).collect::<Result<_>>()?;

        let mut out = Transitions {
            pairs: Vec::new(),
            outgoing: vec![Vec::new(); earlier.len()],
            incoming: vec![Vec::new(); later.len()],
        };
        for pair in found.into_iter().flatten() {
            out.outgoing[pair.from].push(pair.relation);
            out.incoming[pair.to].push(pair.relation);
            out.pairs.push(pair);
        }
        debug!(
            snapshot,
            sources = earlier.len(),
            targets = later.len(),
            relations = out.pairs.len(),
            "transitions classified"
        );
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn community(ids: &[u32]) -> Community {
        ids.iter().map(|i| i.to_string()).collect()
    }

    fn uniform(ids: &[u32]) -> SocialPosition {
        ids.iter().map(|i| (i.to_string(), 1.0)).collect()
    }

    #[test]
    fn test_inclusion_weights_by_position() {
        let c1 = community(&[1, 2, 3, 4]);
        let c2 = community(&[1, 2, 9]);
        let sp: SocialPosition = [("1", 0.4), ("2", 0.1), ("3", 0.25), ("4", 0.25)]
            .into_iter()
            .collect();
        // quantity 2/4, quality 0.5/1.0
        assert!((inclusion(&c1, &c2, &sp).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_inclusion_zero_mass_is_error() {
        let c = community(&[1, 2, 3]);
        let sp: SocialPosition = [("1", 0.0), ("2", 0.0), ("3", 0.0)].into_iter().collect();
        assert!(matches!(
            inclusion(&c, &c, &sp),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_growing_then_continuing() {
        let a = community(&[1, 2, 3]);
        let b = community(&[1, 2, 3, 4]);
        let c = community(&[1, 2, 3, 4]);
        let sp = uniform(&[1, 2, 3, 4]);
        let ged = Ged::default();
        assert_eq!(ged.classify(&a, &b, &sp, &sp).unwrap(), Some(Relation::Growing));
        assert_eq!(ged.classify(&b, &c, &sp, &sp).unwrap(), Some(Relation::Continuing));
    }

    #[test]
    fn test_rule_precedence() {
        // both shrinking predicates and splitting's hold; shrinking wins
        assert_eq!(classify_scores(0.2, 0.9, 5, 3, 0.5, 0.5), Some(Relation::Shrinking));
        // merging only reachable when growing's first clause fails on strictness
        assert_eq!(classify_scores(0.5, 0.5, 3, 5, 0.5, 0.5), Some(Relation::Merging));
        // nothing matches
        assert_eq!(classify_scores(0.1, 0.1, 3, 5, 0.5, 0.5), None);
        assert_eq!(classify_scores(0.2, 0.9, 3, 5, 0.5, 0.5), None);
    }

    #[test]
    fn test_aggregation_rules() {
        use Relation::*;
        assert_eq!(aggregate_outgoing(&[]), Event::Dissolving);
        assert_eq!(aggregate_outgoing(&[Shrinking]), Event::Shrinking);
        assert_eq!(aggregate_outgoing(&[Continuing]), Event::Continuing);
        assert_eq!(aggregate_outgoing(&[Growing]), Event::None);
        assert_eq!(aggregate_outgoing(&[Growing, Merging]), Event::Splitting);

        assert_eq!(aggregate_incoming(&[]), Event::Forming);
        assert_eq!(aggregate_incoming(&[Growing]), Event::Growing);
        assert_eq!(aggregate_incoming(&[Continuing]), Event::None);
        assert_eq!(aggregate_incoming(&[Shrinking, Shrinking]), Event::Merging);
    }

    #[test]
    fn test_transitions_bookkeeping() {
        let earlier = Partition {
            communities: vec![community(&[1, 2, 3]), community(&[7, 8, 9])],
        };
        let later = Partition {
            communities: vec![community(&[1, 2, 3, 4]), community(&[20, 21, 22])],
        };
        let sp1 = uniform(&[1, 2, 3, 7, 8, 9]);
        let sp2 = uniform(&[1, 2, 3, 4, 20, 21, 22]);
        let t = Ged::default()
            .transitions(0, &earlier, &later, &sp1, &sp2)
            .unwrap();
        assert_eq!(
            t.pairs,
            vec![PairRelation {
                from: 0,
                to: 0,
                relation: Relation::Growing
            }]
        );
        // A lone growing relation gives the source no next event
        assert_eq!(t.next_events(), vec![Event::None, Event::Dissolving]);
        assert_eq!(t.pre_events(), vec![Event::Growing, Event::Forming]);
    }

    #[test]
    fn test_transition_error_context() {
        let earlier = Partition {
            communities: vec![community(&[1, 2, 3])],
        };
        let later = Partition {
            communities: vec![community(&[1, 2, 3])],
        };
        let sp1 = uniform(&[1, 2]);
        let err = Ged::default()
            .transitions(4, &earlier, &later, &sp1, &sp1)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transition {
                snapshot: 4,
                from: 0,
                to: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_event_codes_roundtrip_names() {
        for event in Event::ALL {
            assert_eq!(Event::from_code(event.code()), Some(event));
        }
        assert_eq!(Event::from_code(8), None);
        assert_eq!(serde_json::to_string(&Event::Dissolving).unwrap(), "\"dissolving\"");
    }

    #[test]
    fn test_validate_thresholds() {
        assert!(Ged::default().validate().is_ok());
        assert!(Ged::new(1.5, 0.5).validate().is_err());
    }

    proptest! {
        #[test]
        fn self_inclusion_is_one(
            scores in proptest::collection::vec(0.01f64..10.0, 3..12),
        ) {
            let ids: Vec<u32> = (0..scores.len() as u32).collect();
            let c = community(&ids);
            let sp: SocialPosition = ids
                .iter()
                .zip(&scores)
                .map(|(i, s)| (i.to_string(), *s))
                .collect();
            let value = inclusion(&c, &c, &sp).unwrap();
            prop_assert!((value - 1.0).abs() < 1e-9);
        }

        #[test]
        fn identical_communities_continue(
            n in 3u32..10,
            alpha in 0.0f64..=1.0,
            beta in 0.0f64..=1.0,
        ) {
            let ids: Vec<u32> = (0..n).collect();
            let c = community(&ids);
            let sp = uniform(&ids);
            let relation = Ged::new(alpha, beta).classify(&c, &c, &sp, &sp).unwrap();
            prop_assert_eq!(relation, Some(Relation::Continuing));
        }

        #[test]
        fn inclusion_in_unit_interval(
            a in proptest::collection::btree_set(0u32..20, 3..10),
            b in proptest::collection::btree_set(0u32..20, 3..10),
        ) {
            let a: Vec<u32> = a.into_iter().collect();
            let b: Vec<u32> = b.into_iter().collect();
            let sp = uniform(&(0..20).collect::<Vec<_>>());
            let value = inclusion(&community(&a), &community(&b), &sp).unwrap();
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}
