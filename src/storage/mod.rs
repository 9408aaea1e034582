//! Edge storage for the merge graph.
//!
//! Holds the immutable candidate edges loaded at startup together with the
//! mutable `body` column that tags rows with the body they were last found in.

mod edge;
mod table;

/// Edge values and the endpoint translation applied while loading them.
pub use edge::{Anchor, Edge, EdgeRow, SupervoxelMapping};

/// Columnar edge table and its summary counts.
pub use table::{EdgeTable, TableStats, TagState};
