//! Generic (non-tensor-core) tiling policy.
//!
//! The base policy the tensor-core policy delegates to for nodes without a
//! tensor-core tag and for the whole-node fallback of reduction-step
//! assignment. It carries only the depth the tensor-core policy needs:
//! factor-based step assignment, shared-memory estimation, thread-level
//! block splitting, and vectorization planning.

use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};
use snafu::OptionExt;
use tilek_arch::{Arch, MemScope};
use tilek_graph::OpNode;

use crate::config::KernelConfig;
use crate::error::*;
use crate::factor::{all_factors, factorize};
use crate::rasterization::Rasterization;
use crate::stride::Stride;
use crate::tensorcore::WMMA_SHAPE;
use crate::tile::{StepMap, TileDict};
use crate::traits::{SmemEstimate, StepCandidates, StrideMaps, TilingPolicy};

/// Largest reduction step the generic assignment picks per axis.
const GENERIC_STEP_CAP: usize = 16;

/// Output-element count above which large kernels get column rasterization.
const RASTER_THRESHOLD: usize = 1 << 20;

/// Widest vector access, in bytes.
const MAX_VECTOR_BYTES: usize = 16;

/// Generic tiling policy over a group of nodes on one architecture.
#[derive(Debug, Clone)]
pub struct GenericPolicy {
    arch: Arc<Arch>,
    nodes: Vec<Arc<OpNode>>,
}

impl GenericPolicy {
    pub fn new(nodes: Vec<Arc<OpNode>>, arch: Arc<Arch>) -> Self {
        Self { arch, nodes }
    }

    /// Policy over a single node.
    pub fn single(node: OpNode, arch: Arch) -> Self {
        Self::new(vec![Arc::new(node)], Arc::new(arch))
    }

    /// Per-buffer vector lane widths for cooperative shared-memory staging.
    ///
    /// The lane width is the largest power of two dividing the buffer's
    /// innermost staged extent, capped by a 16-byte access and by the
    /// requirement that `block_size` threads can split the fetch evenly.
    pub fn plan_vectorize(&self, node: &OpNode, td: &TileDict, block_size: usize) -> Result<BTreeMap<String, usize>> {
        let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
        let shapes = node.propagate_reduction_inputs(&entry.tile, &entry.rstep)?;

        let mut plan = BTreeMap::new();
        for (buf, shape) in node.inputs.iter().zip(&shapes) {
            let Some(&inner) = shape.last() else { continue };
            let elems: usize = shape.iter().product();

            let mut width = 1;
            while inner.is_multiple_of(width * 2) && (width * 2) * buf.dtype.bytes() <= MAX_VECTOR_BYTES {
                width *= 2;
            }
            while width > 1 && !elems.is_multiple_of(block_size * width) {
                width /= 2;
            }
            if width > 1 {
                plan.insert(buf.name.clone(), width);
            }
        }
        Ok(plan)
    }
}

impl TilingPolicy for GenericPolicy {
    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn nodes(&self) -> &[Arc<OpNode>] {
        &self.nodes
    }

    fn infer_node_smem_usage(&self, td: &TileDict, node: &OpNode) -> Result<SmemEstimate> {
        let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
        let shapes = node.propagate_reduction_inputs(&entry.tile, &entry.rstep)?;

        let mut bytes = 0;
        let mut cached = Vec::with_capacity(node.inputs.len());
        for (buf, shape) in node.inputs.iter().zip(&shapes) {
            bytes += shape.iter().product::<usize>() * buf.dtype.bytes();
            cached.push(buf.name.clone());
        }
        Ok(SmemEstimate { bytes, cached })
    }

    fn assign_reduce_step(&self, node: &OpNode) -> StepMap {
        node.reduce_axes
            .iter()
            .map(|ax| {
                let step =
                    all_factors(ax.extent).into_iter().rev().find(|&f| f <= GENERIC_STEP_CAP).unwrap_or(1);
                (ax.name.clone(), step)
            })
            .collect()
    }

    fn reduce_step_candidates(&self, node: &OpNode) -> StepCandidates {
        node.reduce_axes.iter().map(|ax| (ax.name.clone(), all_factors(ax.extent))).collect()
    }

    fn expand_reduce_axis(&self, td: &mut TileDict) {
        for node in &self.nodes {
            let Some(mut entry) = td.get(node).cloned() else { continue };
            let candidates = self.reduce_step_candidates(node);
            let mut grew = false;

            for ax in &node.reduce_axes {
                let Some(steps) = candidates.get(&ax.name) else { continue };
                let mut current = entry.rstep.get(&ax.name).copied().unwrap_or(1);

                for &step in steps {
                    if step <= current {
                        continue;
                    }
                    entry.rstep.insert(ax.name.clone(), step);
                    let mut scratch = td.clone();
                    scratch.insert(node, entry.clone());
                    match self.infer_node_smem_usage(&scratch, node) {
                        Ok(est) if est.bytes <= self.arch.smem_cap => {
                            current = step;
                            grew = true;
                        }
                        _ => {
                            entry.rstep.insert(ax.name.clone(), current);
                            break;
                        }
                    }
                }
            }
            if grew {
                td.insert(node, entry);
            }
        }
    }

    fn check_tile_shape_is_valid(&self, td: &TileDict) -> bool {
        for node in &self.nodes {
            let Some(entry) = td.get(node) else { return false };
            if entry.tile.len() != node.space_axes.len() {
                return false;
            }
            if node.space_axes.iter().zip(&entry.tile).any(|(ax, &t)| t == 0 || t > ax.extent) {
                return false;
            }
            if !node.is_tensor_core() {
                for ax in &node.reduce_axes {
                    if let Some(&step) = entry.rstep.get(&ax.name)
                        && (step == 0 || !ax.extent.is_multiple_of(step))
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn compute_node_stride_map(&self, node: &OpNode, _td: &TileDict) -> Result<StrideMaps> {
        // Generic staging needs no padding.
        let outputs = (0..node.outputs.len()).map(|i| (node.inputs.len() + i, Stride::NONE)).collect();
        Ok(StrideMaps { outputs, tensors: BTreeMap::new() })
    }

    fn assign_block_size(&self, node: &OpNode, td: &TileDict, block_size: usize) -> Result<Option<KernelConfig>> {
        if !block_size.is_multiple_of(self.arch.warp_size) || block_size > self.arch.max_threads_per_block {
            return Ok(None);
        }
        let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
        let tile = &entry.tile;
        let ndim = tile.len();

        // Split threads over axes: each prime factor (largest first) goes to
        // the axis with the most per-thread work left that it divides evenly.
        let mut thread: SmallVec<[usize; 4]> = smallvec![1; ndim];
        for &factor in factorize(block_size).iter().rev() {
            let mut best: Option<(usize, usize)> = None;
            for i in 0..ndim {
                let per_thread = tile[i] / thread[i];
                if !per_thread.is_multiple_of(factor) {
                    continue;
                }
                if best.is_none_or(|(r, _)| per_thread > r) {
                    best = Some((per_thread, i));
                }
            }
            let Some((_, axis)) = best else { return Ok(None) };
            thread[axis] *= factor;
        }

        let warp: SmallVec<[usize; 4]> = tile.iter().zip(&thread).map(|(t, th)| t / th).collect();
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
            warp,
            use_tensor_core: false,
            pipeline_stage: 1,
            use_async_copy: false,
            reduce_step,
            cached_tensors: entry.cached.clone(),
            wmma_shape: WMMA_SHAPE,
            vectorize: self.plan_vectorize(node, td, block_size)?,
        }))
    }

    fn plan_rasterization(&self, _td: &TileDict) -> Rasterization {
        let Some(node) = self.nodes.first() else { return Rasterization::None };
        if self.arch.compute_capability.is_sm80_class() && node.space_elems() > RASTER_THRESHOLD {
            Rasterization::Column2D { panel_width: 4 }
        } else {
            Rasterization::None
        }
    }
}

/// Read-cost estimate for one warp/thread split: summed propagated input
/// volume over the bandwidth of the scope each buffer is read from.
/// Smaller is better.
pub(crate) fn input_read_cost(
    arch: &Arch,
    node: &OpNode,
    tile: &[usize],
    split: &[usize],
    cached: &[String],
) -> Result<f64> {
    let block_tile: SmallVec<[usize; 4]> = tile.iter().zip(split).map(|(t, s)| t.div_ceil(*s)).collect();
    let shapes = node.propagate_inputs(&block_tile)?;

    let mut cost = 0.0;
    for (buf, shape) in node.inputs.iter().zip(&shapes) {
        let scope = if cached.iter().any(|c| c == &buf.name) { MemScope::Shared } else { MemScope::Global };
        cost += shape.iter().product::<usize>() as f64 / arch.bandwidth(scope);
    }
    Ok(cost)
}
