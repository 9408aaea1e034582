use rustc_hash::FxHashMap;

use crate::error::{MergeGraphError, Result};
use crate::types::{BodyId, SupervoxelId};

/// Translation table applied to edge endpoints before they enter the table.
pub type SupervoxelMapping = FxHashMap<SupervoxelId, SupervoxelId>;

/// Voxel coordinate `(z, y, x)` of the point where an edge was observed.
pub type Anchor = [i32; 3];

/// Candidate connection between two supervoxels.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    /// Lower endpoint.
    pub id_a: SupervoxelId,
    /// Higher endpoint.
    pub id_b: SupervoxelId,
    /// Agglomeration score.
    pub score: f32,
    /// Location of the contact on the `id_a` side, when known.
    pub anchor_a: Option<Anchor>,
    /// Location of the contact on the `id_b` side, when known.
    pub anchor_b: Option<Anchor>,
}

impl Edge {
    /// Creates an edge without anchor coordinates.
    pub fn new(id_a: impl Into<SupervoxelId>, id_b: impl Into<SupervoxelId>, score: f32) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            score,
            anchor_a: None,
            anchor_b: None,
        }
    }

    /// Attaches contact coordinates for both endpoints.
    pub fn with_anchors(mut self, anchor_a: Anchor, anchor_b: Anchor) -> Self {
        self.anchor_a = Some(anchor_a);
        self.anchor_b = Some(anchor_b);
        self
    }

    /// Orders endpoints so `id_a < id_b`, swapping anchors along with them.
    ///
    /// Fails for self-edges, which the table never stores.
    pub fn normalized(mut self) -> Result<Self> {
        if self.id_a == self.id_b {
            return Err(MergeGraphError::InvalidEdge {
                id_a: self.id_a,
                id_b: self.id_b,
                reason: "self-edge",
            });
        }
        if self.id_a > self.id_b {
            std::mem::swap(&mut self.id_a, &mut self.id_b);
            std::mem::swap(&mut self.anchor_a, &mut self.anchor_b);
        }
        Ok(self)
    }

    /// Rewrites both endpoints through `mapping`; ids absent from it are kept.
    pub fn remapped(mut self, mapping: &SupervoxelMapping) -> Self {
        if let Some(mapped) = mapping.get(&self.id_a) {
            self.id_a = *mapped;
        }
        if let Some(mapped) = mapping.get(&self.id_b) {
            self.id_b = *mapped;
        }
        self
    }
}

/// Row returned by an extraction: the edge, its table position and current tag.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeRow {
    /// Position of the row in the table.
    pub position: usize,
    /// The edge stored at that position.
    pub edge: Edge,
    /// Value of the `body` column when the row was read.
    pub body: BodyId,
}
