//! Per-candidate tile state shared between the policy hooks.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tilek_graph::OpNode;

/// Reduction steps keyed by axis name.
pub type StepMap = BTreeMap<String, usize>;

/// Tile state for one node: chosen tile shape, reduction steps, and the
/// tensors the shared-memory estimator decided to cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTile {
    pub tile: SmallVec<[usize; 4]>,
    pub rstep: StepMap,
    pub cached: Vec<String>,
}

impl NodeTile {
    pub fn new(tile: impl IntoIterator<Item = usize>, rstep: StepMap) -> Self {
        Self { tile: tile.into_iter().collect(), rstep, cached: Vec::new() }
    }
}

/// Tile dictionary for one search candidate.
///
/// Maps each node (by name) to its [`NodeTile`] and accumulates the
/// candidate's shared-memory cost. Tile extents are positive; reduction
/// steps divide the axis domain in the generic case and are multiples of
/// the tensor-core reduction granularity in the tensor-core case.
#[derive(Debug, Clone, Default)]
pub struct TileDict {
    entries: BTreeMap<String, NodeTile>,
    /// Shared-memory bytes required by this candidate, filled by the
    /// usage estimator.
    pub smem_cost: usize,
}

impl TileDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: &OpNode, entry: NodeTile) {
        self.entries.insert(node.name.clone(), entry);
    }

    pub fn get(&self, node: &OpNode) -> Option<&NodeTile> {
        self.entries.get(&node.name)
    }

    pub fn get_mut(&mut self, node: &OpNode) -> Option<&mut NodeTile> {
        self.entries.get_mut(&node.name)
    }

    pub fn tile(&self, node: &OpNode) -> Option<&[usize]> {
        self.get(node).map(|e| e.tile.as_slice())
    }

    pub fn rstep(&self, node: &OpNode) -> Option<&StepMap> {
        self.get(node).map(|e| &e.rstep)
    }
}
