//! Body-scoped merge-graph extraction.
//!
//! A fixed table of candidate edges between supervoxels is filtered down to
//! the edges internal to one body, where body membership comes from an
//! external, versioned segmentation service. Answers are memoized in the
//! table's `body` column and validated against fresh membership on every
//! query, falling back to a full scan when the column has drifted.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod options;
pub mod primitives;
pub mod storage;
pub mod types;

pub use cache::{
    CacheKey, FetchError, Generation, InMemoryMembership, MembershipCache, MembershipSource,
};
pub use error::{MergeGraphError, Result};
pub use graph::{BodyEdges, MergeGraphIndex, QueryPath, RepairOutcome, VersionContext};
pub use metrics::{CounterMetrics, MergeGraphMetrics, NoopMetrics};
pub use options::{MergeGraphConfig, MergeGraphOptions};
pub use storage::{Edge, EdgeRow, EdgeTable, SupervoxelMapping};
pub use types::{BodyId, MembershipSet, SupervoxelId};
