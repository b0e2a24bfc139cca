//! Candidate enumeration and ranking.
//!
//! The search loop that drives the policy hooks: propose whole tiles from
//! the divisors of each spatial extent, prune through the validity and
//! shared-memory checks, split the survivors across the configured block
//! sizes, and return the top-k configurations by estimated global traffic.
//! Deterministic for fixed inputs.

use itertools::Itertools;
use snafu::OptionExt;
use tilek_arch::MemScope;
use tilek_graph::OpNode;

use crate::config::{KernelConfig, SearchOptions};
use crate::error::*;
use crate::factor::all_factors;
use crate::tile::{NodeTile, TileDict};
use crate::traits::TilingPolicy;

/// Emit up to `opts.topk` ranked kernel configurations for the policy's
/// primary node.
#[tracing::instrument(skip_all, fields(topk = opts.topk))]
pub fn emit_configs<P: TilingPolicy>(policy: &P, opts: &SearchOptions) -> Result<Vec<KernelConfig>> {
    let Some(node) = policy.nodes().first().cloned() else {
        return Ok(Vec::new());
    };
    let node = node.as_ref();

    let rstep = policy.assign_reduce_step(node);
    let budget = opts.smem_budget.unwrap_or(policy.arch().smem_cap);

    // Whole tiles only: per-axis candidates are the divisors of the extent.
    let axis_candidates: Vec<Vec<usize>> = node.space_axes.iter().map(|ax| all_factors(ax.extent)).collect();

    let mut scored: Vec<(f64, KernelConfig)> = Vec::new();
    let mut pruned = 0usize;
    for tile in axis_candidates.iter().map(|c| c.iter().copied()).multi_cartesian_product() {
        let mut td = TileDict::new();
        td.insert(node, NodeTile::new(tile, rstep.clone()));
        policy.expand_reduce_axis(&mut td);

        let est = policy.infer_node_smem_usage(&td, node)?;
        td.smem_cost = est.bytes;
        if let Some(entry) = td.get_mut(node) {
            entry.cached = est.cached;
        }
        if td.smem_cost > budget || !policy.check_tile_shape_is_valid(&td) {
            pruned += 1;
            continue;
        }

        for &block_size in &opts.block_sizes {
            let Some(config) = policy.assign_block_size(node, &td, block_size)? else { continue };
            scored.push((traffic_score(policy, node, &td)?, config));
        }
    }
    tracing::debug!(accepted = scored.len(), pruned, "tile search complete");

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(opts.topk);
    Ok(scored.into_iter().map(|(_, config)| config).collect())
}

/// Estimated global-memory traffic for one candidate: staged input bytes
/// per reduction stage, times stages, times grid blocks, over bandwidth.
fn traffic_score<P: TilingPolicy>(policy: &P, node: &OpNode, td: &TileDict) -> Result<f64> {
    let entry = td.get(node).context(MissingTileSnafu { node: node.name.clone() })?;
    let shapes = node.propagate_reduction_inputs(&entry.tile, &entry.rstep)?;

    let grid: usize = node.space_axes.iter().zip(&entry.tile).map(|(ax, &t)| ax.extent.div_ceil(t)).product();
    let stages: usize = node
        .reduce_axes
        .iter()
        .map(|ax| ax.extent.div_ceil(entry.rstep.get(&ax.name).copied().unwrap_or(ax.extent)))
        .product();
    let stage_bytes: usize = node
        .inputs
        .iter()
        .zip(&shapes)
        .map(|(buf, shape)| shape.iter().product::<usize>() * buf.dtype.bytes())
        .sum();

    Ok((grid * stages * stage_bytes) as f64 / policy.arch().bandwidth(MemScope::Global))
}
