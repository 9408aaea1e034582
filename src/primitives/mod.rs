//! Low-level primitives shared by the engine.

/// Exclusive-access region guarding the shared edge table.
pub mod concurrency;
