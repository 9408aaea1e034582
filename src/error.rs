//! Error taxonomy of the engine.

use std::io;

use thiserror::Error;

use crate::cache::FetchError;
use crate::types::{BodyId, SupervoxelId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MergeGraphError>;

/// Errors surfaced by the merge-graph engine.
#[derive(Debug, Error)]
pub enum MergeGraphError {
    /// The membership service failed or timed out. Never cached; retrying may succeed.
    #[error("membership for body {body} unavailable: {reason}")]
    MembershipUnavailable {
        /// Body whose membership was requested.
        body: BodyId,
        /// Description reported by the membership source.
        reason: String,
    },
    /// The body does not exist upstream. Definitive; retrying will not help.
    #[error("body {body} not found")]
    MembershipNotFound {
        /// Body whose membership was requested.
        body: BodyId,
    },
    /// The membership fetch was cancelled before it produced a result.
    #[error("membership fetch for body {body} cancelled")]
    FetchCancelled {
        /// Body whose membership was requested.
        body: BodyId,
    },
    /// Body id 0 is reserved for unassigned rows and cannot be queried or tagged.
    #[error("body id 0 is reserved for unassigned rows")]
    UnassignedBody,
    /// An edge row violated the table invariants.
    #[error("invalid edge ({id_a}, {id_b}): {reason}")]
    InvalidEdge {
        /// First endpoint as supplied.
        id_a: SupervoxelId,
        /// Second endpoint as supplied.
        id_b: SupervoxelId,
        /// Which invariant was violated.
        reason: &'static str,
    },
    /// A bulk write referenced a row position outside the table.
    #[error("row position {position} out of range for table of {len} rows")]
    PositionOutOfRange {
        /// Offending position.
        position: usize,
        /// Number of rows in the table.
        len: usize,
    },
    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MergeGraphError {
    /// Converts a collaborator failure for `body` into the engine taxonomy.
    pub fn from_fetch(body: BodyId, err: FetchError) -> Self {
        match err {
            FetchError::NotFound => MergeGraphError::MembershipNotFound { body },
            FetchError::Unavailable(reason) => {
                MergeGraphError::MembershipUnavailable { body, reason }
            }
            FetchError::Cancelled => MergeGraphError::FetchCancelled { body },
        }
    }

    /// Whether calling again with the same arguments may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MergeGraphError::MembershipUnavailable { .. } | MergeGraphError::FetchCancelled { .. }
        )
    }
}

impl From<toml::de::Error> for MergeGraphError {
    fn from(err: toml::de::Error) -> Self {
        MergeGraphError::Config(err.to_string())
    }
}
