//! The hook contract between a tiling policy and the search driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use tilek_arch::Arch;
use tilek_graph::OpNode;

use crate::config::KernelConfig;
use crate::error::Result;
use crate::rasterization::Rasterization;
use crate::stride::Stride;
use crate::tile::{StepMap, TileDict};

/// Legal reduction steps per axis, keyed by axis name, ascending.
pub type StepCandidates = BTreeMap<String, Vec<usize>>;

/// Shared-memory usage estimate for one node under a tile candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmemEstimate {
    /// Required shared-memory bytes.
    pub bytes: usize,
    /// Tensors the estimator decided to stage in shared memory.
    pub cached: Vec<String>,
}

/// Padding strides keyed by flat buffer slot (inputs first, then outputs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrideMaps {
    pub outputs: BTreeMap<usize, Stride>,
    pub tensors: BTreeMap<usize, Stride>,
}

/// Override hooks consumed by the candidate search loop.
///
/// Every hook takes `&self`: a policy's only instance state is fixed at
/// construction, so one policy value is safe to share across concurrent
/// candidate evaluations.
///
/// Infeasible candidates are signaled by `Ok(None)` / `false` and pruned
/// silently; `Err` is reserved for malformed node metadata.
pub trait TilingPolicy {
    fn arch(&self) -> &Arch;

    /// Nodes this policy tiles, in execution order.
    fn nodes(&self) -> &[Arc<OpNode>];

    /// Shared-memory usage of `node` under the candidate in `td`.
    fn infer_node_smem_usage(&self, td: &TileDict, node: &OpNode) -> Result<SmemEstimate>;

    /// Choose a reduction step per reduction axis.
    fn assign_reduce_step(&self, node: &OpNode) -> StepMap;

    /// Legal reduction steps per axis for the search loop to enumerate.
    fn reduce_step_candidates(&self, node: &OpNode) -> StepCandidates;

    /// Grow reduction steps toward the shared-memory budget.
    fn expand_reduce_axis(&self, td: &mut TileDict);

    /// Whether the tile assignment in `td` can be realized on this policy's
    /// hardware and evenly tiles the iteration space.
    fn check_tile_shape_is_valid(&self, td: &TileDict) -> bool;

    /// Shared-memory padding strides for `node`'s operands.
    fn compute_node_stride_map(&self, node: &OpNode, td: &TileDict) -> Result<StrideMaps>;

    /// Split the tile in `td` across `block_size` threads, producing a
    /// finalized configuration, or `None` if the block size is infeasible.
    fn assign_block_size(&self, node: &OpNode, td: &TileDict, block_size: usize) -> Result<Option<KernelConfig>>;

    /// Thread-block launch-order policy for the candidate in `td`.
    fn plan_rasterization(&self, td: &TileDict) -> Rasterization;
}
