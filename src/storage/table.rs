use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::edge::{Anchor, Edge, EdgeRow, SupervoxelMapping};
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{MergeGraphError, Result};
use crate::types::{BodyId, MembershipSet, SupervoxelId};

/// Counts describing the current state of an [`EdgeTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Total number of rows.
    pub rows: usize,
    /// Rows whose `body` column holds a body id.
    pub assigned_rows: usize,
    /// Distinct bodies currently tagged in the `body` column.
    pub tagged_bodies: usize,
}

/// What the `body` column currently claims about one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagState {
    /// Positions tagged with the body, ascending.
    pub positions: Vec<usize>,
    /// Sorted unique endpoints of those rows.
    pub implied: Vec<SupervoxelId>,
    /// Member set the rows were last retagged against, if still valid.
    pub verified: Option<MembershipSet>,
    /// False once any of the body's rows changed outside its own retag.
    pub intact: bool,
}

/// Columnar store of candidate edges with a mutable, advisory `body` column.
///
/// Endpoint and score columns never change after construction. The `body`
/// column is an optimization hint that may lag behind the membership service;
/// readers must validate it before trusting it. Mutation is crate-private and
/// happens only inside the exclusive region held by the merge-graph index.
#[derive(Debug)]
pub struct EdgeTable {
    id_a: Vec<SupervoxelId>,
    id_b: Vec<SupervoxelId>,
    score: Vec<f32>,
    anchor_a: Vec<Option<Anchor>>,
    anchor_b: Vec<Option<Anchor>>,
    body: Vec<BodyId>,
    // Positions per assigned body; UNASSIGNED rows are not indexed.
    by_body: FxHashMap<BodyId, BTreeSet<usize>>,
    // Member set each body's rows were last retagged against. Dropped as soon
    // as any row tagged with (or newly tagged as) that body changes. Bounded;
    // an evicted witness only costs one extra scan.
    verified: LruCache<BodyId, MembershipSet>,
    // Bodies that lost rows to a write other than their own retag and still
    // hold some. Their remaining tags may imply the full member set while
    // missing rows.
    disturbed: FxHashSet<BodyId>,
}

impl EdgeTable {
    /// Builds a table from already-loaded edges.
    ///
    /// Each edge is normalized so `id_a < id_b`. Self-edges are rejected with
    /// [`MergeGraphError::InvalidEdge`]. Every row starts unassigned.
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = Edge>,
    {
        let iter = edges.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        for edge in iter {
            table.push(edge.normalized()?);
        }
        debug!(rows = table.len(), "edge_table.build");
        Ok(table)
    }

    /// Builds a table after translating endpoints through `mapping`.
    ///
    /// Edges whose endpoints collapse onto the same supervoxel after
    /// translation are dropped instead of rejected.
    pub fn with_mapping<I>(edges: I, mapping: &SupervoxelMapping) -> Result<Self>
    where
        I: IntoIterator<Item = Edge>,
    {
        let iter = edges.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        let mut dropped = 0usize;
        for edge in iter {
            let edge = edge.remapped(mapping);
            if edge.id_a == edge.id_b {
                dropped += 1;
                continue;
            }
            table.push(edge.normalized()?);
        }
        debug!(
            rows = table.len(),
            dropped_self_edges = dropped,
            mapping_len = mapping.len(),
            "edge_table.build_mapped"
        );
        Ok(table)
    }

    fn with_capacity(rows: usize) -> Self {
        Self {
            id_a: Vec::with_capacity(rows),
            id_b: Vec::with_capacity(rows),
            score: Vec::with_capacity(rows),
            anchor_a: Vec::with_capacity(rows),
            anchor_b: Vec::with_capacity(rows),
            body: Vec::with_capacity(rows),
            by_body: FxHashMap::default(),
            verified: LruCache::new(witness_capacity(DEFAULT_CACHE_CAPACITY)),
            disturbed: FxHashSet::default(),
        }
    }

    fn push(&mut self, edge: Edge) {
        self.id_a.push(edge.id_a);
        self.id_b.push(edge.id_b);
        self.score.push(edge.score);
        self.anchor_a.push(edge.anchor_a);
        self.anchor_b.push(edge.anchor_b);
        self.body.push(BodyId::UNASSIGNED);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.id_a.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.id_a.is_empty()
    }

    /// Returns the edge stored at `position`.
    pub fn edge(&self, position: usize) -> Option<Edge> {
        if position >= self.len() {
            return None;
        }
        Some(Edge {
            id_a: self.id_a[position],
            id_b: self.id_b[position],
            score: self.score[position],
            anchor_a: self.anchor_a[position],
            anchor_b: self.anchor_b[position],
        })
    }

    /// Returns the current `body` tag of the row at `position`.
    pub fn body_of(&self, position: usize) -> Option<BodyId> {
        self.body.get(position).copied()
    }

    /// Copy of the whole `body` column.
    pub fn body_column(&self) -> Vec<BodyId> {
        self.body.clone()
    }

    /// Summary counts of the table and its `body` column.
    pub fn stats(&self) -> TableStats {
        TableStats {
            rows: self.len(),
            assigned_rows: self.by_body.values().map(BTreeSet::len).sum(),
            tagged_bodies: self.by_body.len(),
        }
    }

    /// Member set the rows tagged `body` were last derived from, if no write
    /// has touched those rows since.
    pub fn verified_members(&self, body: BodyId) -> Option<&MembershipSet> {
        self.verified.peek(&body)
    }

    /// Number of member sets currently retained as retag witnesses.
    pub fn witness_count(&self) -> usize {
        self.verified.len()
    }

    /// Bounds the number of retained witnesses, evicting the least recently
    /// retagged bodies first. Zero is clamped to one.
    pub(crate) fn set_witness_capacity(&mut self, capacity: usize) {
        self.verified.resize(witness_capacity(capacity));
    }

    /// Everything the `body` column says about `body`, read in one pass.
    pub fn tag_state(&self, body: BodyId) -> TagState {
        let positions = self.positions_with_body(body);
        let implied = self.endpoints(&positions);
        TagState {
            positions,
            implied,
            verified: self.verified.peek(&body).cloned(),
            intact: !self.disturbed.contains(&body),
        }
    }

    /// Positions currently tagged with `body`, ascending.
    ///
    /// Served from the position index, so the cost is proportional to the
    /// number of matching rows. `UNASSIGNED` is never indexed and yields nothing.
    pub fn positions_with_body(&self, body: BodyId) -> Vec<usize> {
        self.by_body
            .get(&body)
            .map(|positions| positions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Positions of rows whose endpoints are both in `members`, ascending.
    ///
    /// Scans every row. Rows with only one member endpoint are cross-body
    /// edges and are excluded.
    pub fn positions_within(&self, members: &MembershipSet) -> Vec<usize> {
        if members.is_empty() {
            return Vec::new();
        }
        let lookup: FxHashSet<SupervoxelId> = members.iter().copied().collect();
        self.id_a
            .iter()
            .zip(&self.id_b)
            .enumerate()
            .filter(|(_, (a, b))| lookup.contains(a) && lookup.contains(b))
            .map(|(position, _)| position)
            .collect()
    }

    /// Materializes rows at `positions`. Out-of-range positions are skipped.
    pub fn rows(&self, positions: &[usize]) -> Vec<EdgeRow> {
        positions
            .iter()
            .filter_map(|&position| {
                self.edge(position).map(|edge| EdgeRow {
                    position,
                    edge,
                    body: self.body[position],
                })
            })
            .collect()
    }

    /// Rows currently tagged with `body`.
    pub fn rows_with_body(&self, body: BodyId) -> Vec<EdgeRow> {
        self.rows(&self.positions_with_body(body))
    }

    /// Rows whose endpoints are both in `members`.
    pub fn rows_within(&self, members: &MembershipSet) -> Vec<EdgeRow> {
        self.rows(&self.positions_within(members))
    }

    /// Sorted, duplicate-free endpoints of the rows at `positions`.
    pub fn endpoints(&self, positions: &[usize]) -> Vec<SupervoxelId> {
        let mut ids: Vec<SupervoxelId> = positions
            .iter()
            .filter(|&&position| position < self.len())
            .flat_map(|&position| [self.id_a[position], self.id_b[position]])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn check_positions(&self, positions: &[usize]) -> Result<()> {
        let len = self.len();
        match positions.iter().find(|&&position| position >= len) {
            Some(&position) => Err(MergeGraphError::PositionOutOfRange { position, len }),
            None => Ok(()),
        }
    }

    fn assign(&mut self, position: usize, body: BodyId) {
        let previous = self.body[position];
        if previous == body {
            return;
        }
        self.verified.pop(&previous);
        self.verified.pop(&body);
        if !previous.is_unassigned() {
            self.disturbed.insert(previous);
            if let Some(positions) = self.by_body.get_mut(&previous) {
                positions.remove(&position);
                if positions.is_empty() {
                    // With no rows and no witness left, only an empty member
                    // set can match, and its answer is empty anyway.
                    self.by_body.remove(&previous);
                    self.disturbed.remove(&previous);
                }
            }
        }
        if !body.is_unassigned() {
            self.by_body.entry(body).or_default().insert(position);
        }
        self.body[position] = body;
    }

    /// Tags every row at `positions` with `body`.
    ///
    /// All positions are validated before any row changes.
    pub(crate) fn set_body(&mut self, positions: &[usize], body: BodyId) -> Result<()> {
        self.check_positions(positions)?;
        for &position in positions {
            self.assign(position, body);
        }
        Ok(())
    }

    /// Resets every row at `positions` to [`BodyId::UNASSIGNED`].
    pub(crate) fn clear_body(&mut self, positions: &[usize]) -> Result<()> {
        self.set_body(positions, BodyId::UNASSIGNED)
    }

    /// Moves the `body` tag from `stale` rows onto `fresh` rows and records
    /// `members` as the set `fresh` was derived from.
    ///
    /// Both lists are validated up front, so either the clear and the set both
    /// happen or the table is left untouched.
    pub(crate) fn retag(
        &mut self,
        body: BodyId,
        stale: &[usize],
        fresh: &[usize],
        members: MembershipSet,
    ) -> Result<()> {
        if body.is_unassigned() {
            return Err(MergeGraphError::UnassignedBody);
        }
        self.check_positions(stale)?;
        self.check_positions(fresh)?;
        self.clear_body(stale)?;
        self.set_body(fresh, body)?;
        self.disturbed.remove(&body);
        self.verified.put(body, members);
        Ok(())
    }

    /// Drops every `body` tag. Recovery operation for a corrupted hint column.
    /// The witness bound is kept.
    pub(crate) fn reset_body_index(&mut self) {
        self.body.iter_mut().for_each(|tag| *tag = BodyId::UNASSIGNED);
        self.by_body.clear();
        self.verified.clear();
        self.disturbed.clear();
    }
}

fn witness_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
