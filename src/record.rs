//! Input records: typed nodes and timestamped edges.
//!
//! Records arrive in the loose shape the upstream collector emits
//! (`{"id", "type"}` for nodes, `{"source", "target", "type", "r", "timestamp"}`
//! for edges). Categories are mapped onto closed enumerations here, each with
//! one fallback variant for values nobody registered.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identifier as it appears in the input records.
pub type NodeId = String;

/// Date format used by edge timestamps.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date assumed for edges that carry no timestamp.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| Error::Parse {
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Node category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Organisations and people holding a stake in the ecosystem.
    Stakeholder,
    /// Products and services.
    Service,
    /// Dated happenings; excluded from snapshots by default.
    Event,
    /// Anything unrecognised.
    #[serde(other)]
    Other,
}

impl NodeKind {
    /// All kinds, in feature-column order.
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Stakeholder,
        NodeKind::Service,
        NodeKind::Event,
        NodeKind::Other,
    ];

    /// Map a raw category string, falling back to [`NodeKind::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Stakeholder" => NodeKind::Stakeholder,
            "Service" => NodeKind::Service,
            "Event" => NodeKind::Event,
            _ => NodeKind::Other,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Stakeholder => "Stakeholder",
            NodeKind::Service => "Service",
            NodeKind::Event => "Event",
            NodeKind::Other => "Other",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation category used to look up initial weight and decay behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// A party left.
    Exit,
    /// Open conflict between the endpoints.
    Conflict,
    /// A party joined.
    Join,
    /// One endpoint acquired the other.
    Acquisition,
    /// Membership / belongs-to.
    Membership,
    /// Structural link (not an event).
    Structural,
    /// Unrecognised relation; uses the default weight and decays.
    Other,
}

impl RelationKind {
    /// Map a secondary relation tag, falling back to [`RelationKind::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "exit" => RelationKind::Exit,
            "conflict" => RelationKind::Conflict,
            "join" => RelationKind::Join,
            "acquisition" => RelationKind::Acquisition,
            "BelongTo" | "membership" => RelationKind::Membership,
            "Structural" | "structural" => RelationKind::Structural,
            _ => RelationKind::Other,
        }
    }
}

/// Raw node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id.
    pub id: NodeId,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl NodeRecord {
    /// Create a node record.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Raw edge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node id.
    pub source: NodeId,
    /// Target node id.
    pub target: NodeId,
    /// Edge type; `"Structural"` edges ignore the relation tag.
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Secondary relation tag for non-structural edges.
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Date stamp (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl EdgeRecord {
    /// Structural edge between two nodes.
    pub fn structural(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: "Structural".to_string(),
            relation: None,
            timestamp: None,
        }
    }

    /// Event edge carrying a relation tag.
    pub fn event(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: "Event".to_string(),
            relation: Some(relation.into()),
            timestamp: None,
        }
    }

    /// Set the date stamp.
    pub fn at(mut self, date: impl Into<String>) -> Self {
        self.timestamp = Some(date.into());
        self
    }

    /// Relation used for the weight lookup.
    pub fn relation_kind(&self) -> RelationKind {
        if self.edge_type == "Structural" {
            return RelationKind::Structural;
        }
        self.relation
            .as_deref()
            .map(RelationKind::from_tag)
            .unwrap_or(RelationKind::Other)
    }

    /// Parsed date stamp, defaulting to [`epoch`] when absent.
    pub fn date(&self) -> Result<NaiveDate> {
        match &self.timestamp {
            Some(value) => parse_date(value),
            None => Ok(epoch()),
        }
    }
}
