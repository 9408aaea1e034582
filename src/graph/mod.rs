//! Body-scoped edge extraction over the shared edge table.
//!
//! [`MergeGraphIndex`] is the entry point. The path decision is a pure
//! function ([`choose_path`]) kept apart from the side-effecting repair
//! ([`RepairPlan`]), so each can be exercised independently.

mod context;
mod index;
mod plan;

pub use context::{versions_match, VersionContext};
pub use index::{BodyEdges, MergeGraphIndex};
pub use plan::{choose_path, QueryPath, RepairOutcome, RepairPlan};
