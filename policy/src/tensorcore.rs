//! Tensor-core tiling policy.
//!
//! Overrides the generic policy for nodes carrying a
//! [`Compute::TensorCore`] tag: reduction steps snap to the matrix-unit
//! granularity, tiles must decompose into supported fragment shapes, warps
//! are assigned sub-tiles by a cost-scored greedy factor search, and
//! shared-memory staging gets padding strides against bank conflicts.
//!
//! Nodes without the tag delegate to the wrapped [`GenericPolicy`]
//! unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};
use snafu::OptionExt;
use tilek_arch::Arch;
use tilek_graph::{Compute, OpNode};

use crate::config::KernelConfig;
use crate::error::*;
use crate::factor::{all_factors, factorize};
use crate::generic::{GenericPolicy, input_read_cost};
use crate::legalize::Legalization;
use crate::rasterization::Rasterization;
use crate::stride::{Stride, TcStridePlan};
use crate::tile::{StepMap, TileDict};
use crate::traits::{SmemEstimate, StepCandidates, StrideMaps, TilingPolicy};

/// Matrix-unit shape (m, n, k).
pub const WMMA_SHAPE: (usize, usize, usize) = (16, 16, 16);

/// Fragment (m, n) shapes one matrix-unit instruction can issue. A block
/// tile is realizable iff at least one of these divides its (m, n) extents.
pub const FRAGMENT_SHAPES: [(usize, usize); 3] = [(16, 16), (8, 32), (32, 8)];

/// Fixed padding added to the product of dimensions past the high axis.
/// TODO(stride): derive from the staged dtype's bank footprint instead of
/// assuming 16-bit elements on 32 banks.
const STRIDE_OFFSET: usize = 8;

/// Tiling policy for tensor-core-eligible nodes.
///
/// Constructed once per (node group, hardware) pair. Legalization results
/// are fixed at construction and read-only afterwards; all hooks take
/// `&self`.
#[derive(Debug, Clone)]
pub struct TensorCorePolicy {
    base: GenericPolicy,
    legal: Legalization,
    wmma_k: usize,
}

impl TensorCorePolicy {
    pub fn new(nodes: Vec<Arc<OpNode>>, arch: Arc<Arch>) -> Self {
        let legal = nodes
            .first()
            .map(|node| Legalization::resolve(node, &arch))
            .unwrap_or(Legalization { pipeline_stage: 1, use_async_copy: false });
        Self { base: GenericPolicy::new(nodes, arch), legal, wmma_k: WMMA_SHAPE.2 }
    }

    /// Policy over a single node.
    pub fn single(node: OpNode, arch: Arch) -> Self {
        Self::new(vec![Arc::new(node)], Arc::new(arch))
    }

    /// Legalized pipeline/async-copy settings.
    pub fn legalization(&self) -> Legalization {
        self.legal
    }

    /// Padding strides for the (A, B, C) operands of `node` under `tile`,
    /// in both phases: at the chosen reduction step (main loop) and at the
    /// full reduction extent. The caller selects by phase.
    pub fn tc_stride_plan(&self, node: &OpNode, tile: &[usize], rstep: &StepMap) -> Result<TcStridePlan> {
        Ok(TcStridePlan {
            main: self.tc_strides(node, tile, rstep)?,
            full: self.tc_strides(node, tile, &StepMap::new())?,
        })
    }

    fn tc_strides(&self, node: &OpNode, tile: &[usize], rstep: &StepMap) -> Result<[Stride; 3]> {
        let shapes = node.propagate_reduction_inputs(tile, rstep)?;
        let axes = node.infer_tensorcore_axis()?;
        let (as_shape, bs_shape, cs_shape) = (&shapes[0], &shapes[1], tile);

        // The high axis is the lower-indexed of the operand's two matrix
        // dimensions; padding its stride past the trailing extent breaks
        // the bank-conflicting power-of-two pattern.
        let stride_past = |shape: &[usize], high: usize| -> Stride {
            Stride::new(shape[high + 1..].iter().product::<usize>() + STRIDE_OFFSET, high)
        };
        Ok([
            stride_past(as_shape, axes.a_m.min(axes.a_k)),
            stride_past(bs_shape, axes.b_n.min(axes.b_k)),
            stride_past(cs_shape, axes.c_m.min(axes.c_n)),
        ])
    }
}

impl TilingPolicy for TensorCorePolicy {
    fn arch(&self) -> &Arch {
        self.base.arch()
    }

    fn nodes(&self) -> &[Arc<OpNode>] {
        self.base.nodes()
    }

    /// Deeper software pipelines buffer proportionally more shared memory.
    fn infer_node_smem_usage(&self, td: &TileDict, node: &OpNode) -> Result<SmemEstimate> {
        let mut est = self.base.infer_node_smem_usage(td, node)?;
        est.bytes *= self.legal.pipeline_stage;
        Ok(est)
    }

    /// Reduction steps sized to the matrix-unit granularity.
    ///
    /// All-or-nothing: one axis whose domain is not a multiple of the
    /// granularity sends the whole node to the generic assignment.
    fn assign_reduce_step(&self, node: &OpNode) -> StepMap {
        if !node.is_tensor_core() {
            return self.base.assign_reduce_step(node);
        }
        let mut steps = StepMap::new();
        for ax in &node.reduce_axes {
            let dom = ax.extent;
            if !dom.is_multiple_of(self.wmma_k) {
                return self.base.assign_reduce_step(node);
            }
            let step = if dom.is_multiple_of(32) {
                32
            } else if dom < 32 {
                16
            } else {
                32
            };
            steps.insert(ax.name.clone(), step);
        }
        steps
    }

    fn reduce_step_candidates(&self, node: &OpNode) -> StepCandidates {
        if !node.is_tensor_core() {
            return self.base.reduce_step_candidates(node);
        }
        // Legal steps are whole multiples of the matrix-unit K.
        node.reduce_axes
            .iter()
            .map(|ax| {
                let steps = all_factors(ax.extent / self.wmma_k).into_iter().map(|f| f * self.wmma_k).collect();
                (ax.name.clone(), steps)
            })
            .collect()
    }

    /// Reduction tiling is fixed by the step assignment; nothing to grow.
    fn expand_reduce_axis(&self, _td: &mut TileDict) {}

    fn check_tile_shape_is_valid(&self, td: &TileDict) -> bool {
        for node in self.nodes() {
            let Compute::TensorCore { axis_m, axis_n } = node.compute else { continue };
            let Some(entry) = td.get(node) else { return false };
            let (Some(&block_m), Some(&block_n)) = (entry.tile.get(axis_m), entry.tile.get(axis_n)) else {
                return false;
            };
            if !FRAGMENT_SHAPES
                .iter()
                .any(|&(frag_m, frag_n)| block_m.is_multiple_of(frag_m) && block_n.is_multiple_of(frag_n))
            {
                return false;
            }
            // No tail tiles: every axis must split its domain evenly.
            if node.space_axes.iter().zip(&entry.tile).any(|(ax, &t)| t == 0 || !ax.extent.is_multiple_of(t)) {
                return false;
            }
        }
        self.base.check_tile_shape_is_valid(td)
    }

    fn compute_node_stride_map(&self, node: &OpNode, td: &TileDict) -> Result<StrideMaps> {
        if !node.is_tensor_core() {
            return self.base.compute_node_stride_map(node, td);
        }
        let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
        let plan = self.tc_stride_plan(node, &entry.tile, &entry.rstep)?;
        tracing::trace!(node = %node.name, ?plan, "tensor-core stride plan");

        // The tensor-core-native layout needs no padding; output slots get
        // the sentinel and staged tensors are left unpadded here. Callers
        // that skip the native layout take the plan from `tc_stride_plan`.
        let outputs = (0..node.outputs.len()).map(|i| (node.inputs.len() + i, Stride::NONE)).collect();
        Ok(StrideMaps { outputs, tensors: BTreeMap::new() })
    }

    #[tracing::instrument(skip_all, fields(node = %node.name, block_size))]
    fn assign_block_size(&self, node: &OpNode, td: &TileDict, block_size: usize) -> Result<Option<KernelConfig>> {
        let Compute::TensorCore { axis_m, axis_n } = node.compute else {
            return self.base.assign_block_size(node, td, block_size);
        };
        if !block_size.is_multiple_of(self.arch().warp_size) {
            return Ok(None);
        }
        let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
        let tile = &entry.tile;
        let ndim = tile.len();
        if axis_m >= ndim || axis_n >= ndim {
            return Err(tilek_graph::error::SpaceAxisOutOfBoundsSnafu { axis: axis_m.max(axis_n), max: ndim }
                .build()
                .into());
        }

        let warps = block_size / self.arch().warp_size;
        let mut wmma_tile: SmallVec<[usize; 4]> = smallvec![1; ndim];
        wmma_tile[axis_m] = WMMA_SHAPE.0;
        wmma_tile[axis_n] = WMMA_SHAPE.1;
        if !tile[axis_m].is_multiple_of(wmma_tile[axis_m]) || !tile[axis_n].is_multiple_of(wmma_tile[axis_n]) {
            return Ok(None);
        }

        // Fragment cells per axis; they must split evenly across warps.
        let space: SmallVec<[usize; 4]> = tile.iter().zip(&wmma_tile).map(|(t, w)| t / w).collect();
        let cells: usize = space.iter().product();
        if !cells.is_multiple_of(warps) {
            return Ok(None);
        }

        // Greedy factor placement: each prime factor of the per-warp cell
        // count (largest first) multiplies the single axis whose resulting
        // read cost is smallest; ties keep the lowest axis index.
        let mut warp_tile = wmma_tile;
        for &factor in factorize(cells / warps).iter().rev() {
            let mut best: Option<(f64, usize)> = None;
            for i in 0..ndim {
                if !tile[i].is_multiple_of(warp_tile[i] * factor) {
                    continue;
                }
                warp_tile[i] *= factor;
                let cost = input_read_cost(self.arch(), node, tile, &warp_tile, &entry.cached)?;
                warp_tile[i] /= factor;
                if best.is_none_or(|(c, _)| cost < c) {
                    best = Some((cost, i));
                }
            }
            let Some((_, axis)) = best else {
                tracing::debug!(factor, "no axis can absorb factor; candidate rejected");
                return Ok(None);
            };
            warp_tile[axis] *= factor;
        }

        let reduce_step = node
            .reduce_axes
            .iter()
            .map(|ax| {
                entry.rstep.get(&ax.name).copied().context(MissingReduceStepSnafu {
                    node: node.name.clone(),
                    axis: ax.name.clone(),
                })
            })
            .collect::<Result<_>>()?;

        Ok(Some(KernelConfig {
            block: tile.clone(),
            warp: warp_tile,
            use_tensor_core: true,
            pipeline_stage: self.legal.pipeline_stage,
            use_async_copy: self.legal.use_async_copy,
            reduce_step,
            cached_tensors: entry.cached.clone(),
            wmma_shape: WMMA_SHAPE,
            vectorize: self.base.plan_vectorize(node, td, block_size)?,
        }))
    }

    /// Tensor-core kernels keep the standard launch order.
    fn plan_rasterization(&self, _td: &TileDict) -> Rasterization {
        Rasterization::None
    }
}
