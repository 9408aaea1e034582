//! Identifier types shared across the engine.

use std::fmt;

mod membership;

pub use membership::MembershipSet;

/// Identifier of an atomic segment unit (supervoxel).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SupervoxelId(pub u64);

/// Identifier of a body, the union of one or more supervoxels.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct BodyId(pub u64);

impl BodyId {
    /// Sentinel stored in the `body` column for rows not assigned to any body.
    pub const UNASSIGNED: BodyId = BodyId(0);

    /// Returns true if this id is the unassigned sentinel.
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SupervoxelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SupervoxelId {
    fn from(value: u64) -> Self {
        SupervoxelId(value)
    }
}

impl From<SupervoxelId> for u64 {
    fn from(value: SupervoxelId) -> Self {
        value.0
    }
}

impl From<u64> for BodyId {
    fn from(value: u64) -> Self {
        BodyId(value)
    }
}

impl From<BodyId> for u64 {
    fn from(value: BodyId) -> Self {
        value.0
    }
}
