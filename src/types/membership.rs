use std::ops::Deref;
use std::sync::Arc;

use super::SupervoxelId;

/// Sorted, duplicate-free set of supervoxels belonging to one body.
///
/// Cloning shares the underlying buffer; the contents are never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MembershipSet {
    ids: Arc<[SupervoxelId]>,
}

impl MembershipSet {
    /// Builds a set from ids in any order, dropping duplicates.
    pub fn from_unsorted(mut ids: Vec<SupervoxelId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { ids: ids.into() }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Membership test by binary search.
    pub fn contains(&self, id: SupervoxelId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Members in ascending order.
    pub fn as_slice(&self) -> &[SupervoxelId] {
        &self.ids
    }

    /// True set equality against an ascending, duplicate-free slice.
    pub fn same_members(&self, sorted_unique: &[SupervoxelId]) -> bool {
        self.as_slice() == sorted_unique
    }

    /// Returns true if both handles point at the same buffer.
    pub fn ptr_eq(&self, other: &MembershipSet) -> bool {
        Arc::ptr_eq(&self.ids, &other.ids)
    }
}

impl Default for MembershipSet {
    fn default() -> Self {
        Self {
            ids: Arc::from(Vec::new()),
        }
    }
}

impl Deref for MembershipSet {
    type Target = [SupervoxelId];

    fn deref(&self) -> &Self::Target {
        &self.ids
    }
}

impl FromIterator<SupervoxelId> for MembershipSet {
    fn from_iter<T: IntoIterator<Item = SupervoxelId>>(iter: T) -> Self {
        Self::from_unsorted(iter.into_iter().collect())
    }
}
