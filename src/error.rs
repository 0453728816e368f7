use thiserror::Error;

/// Result alias for `cevo`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by snapshot construction, community descriptors,
/// event classification and sample assembly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A date stamp on an input record could not be parsed.
    #[error("malformed date '{value}': {message}")]
    Parse {
        /// The offending raw value.
        value: String,
        /// Parser message.
        message: String,
    },

    /// A node referenced by a community lacks a required attribute.
    #[error("node '{node}' has no {attribute} attribute")]
    MissingAttribute {
        /// Node id.
        node: String,
        /// Attribute name.
        attribute: &'static str,
    },

    /// A node referenced by a community is not part of the snapshot.
    #[error("node '{0}' is not present in the snapshot")]
    UnknownNode(String),

    /// A node has no social-position score.
    #[error("node '{0}' has no social-position score")]
    MissingScore(String),

    /// A size-dependent descriptor was requested on a community that is too small.
    #[error("community of size {size} is too small (need at least {required})")]
    InvalidCommunity {
        /// Actual size.
        size: usize,
        /// Minimum size.
        required: usize,
    },

    /// A ratio would be undefined for the given input.
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A stage received per-snapshot inputs of inconsistent length.
    #[error("length mismatch: expected {expected} snapshots, found {found}")]
    LengthMismatch {
        /// Expected count.
        expected: usize,
        /// Found count.
        found: usize,
    },

    /// A meta-node has no feature vector.
    #[error("no features for T{snapshot}C{community}")]
    MissingFeatures {
        /// Snapshot index.
        snapshot: usize,
        /// Community index.
        community: usize,
    },

    /// Failure while processing one snapshot.
    #[error("snapshot {snapshot}: {source}")]
    Snapshot {
        /// Snapshot index.
        snapshot: usize,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Failure while describing one community.
    #[error("snapshot {snapshot}, community {community}: {source}")]
    Community {
        /// Snapshot index.
        snapshot: usize,
        /// Community index within the snapshot.
        community: usize,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Failure while classifying one community pair.
    #[error("transition T{snapshot}C{from} -> T{next}C{to}: {source}", next = .snapshot + 1)]
    Transition {
        /// Index of the earlier snapshot.
        snapshot: usize,
        /// Community index in the earlier snapshot.
        from: usize,
        /// Community index in the later snapshot.
        to: usize,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Failure from an external collaborator (community detection, scoring).
    #[error("collaborator failed: {0}")]
    Collaborator(String),
}

impl Error {
    /// Attach snapshot context.
    pub fn in_snapshot(self, snapshot: usize) -> Self {
        Error::Snapshot {
            snapshot,
            source: Box::new(self),
        }
    }

    /// Attach community context.
    pub fn in_community(self, snapshot: usize, community: usize) -> Self {
        Error::Community {
            snapshot,
            community,
            source: Box::new(self),
        }
    }

    /// Attach transition context.
    pub fn in_transition(self, snapshot: usize, from: usize, to: usize) -> Self {
        Error::Transition {
            snapshot,
            from,
            to,
            source: Box::new(self),
        }
    }
}
