//! Tests for the tensor-core tiling policy.

use smallvec::{smallvec, SmallVec};
use test_case::test_case;
use tilek_arch::Arch;
use tilek_graph::{Compute, ElemType, OpNode};

use crate::generic::GenericPolicy;
use crate::stride::Stride;
use crate::tensorcore::{TensorCorePolicy, WMMA_SHAPE};
use crate::tile::{NodeTile, StepMap, TileDict};
use crate::traits::TilingPolicy;

fn gemm(m: usize, n: usize, k: usize) -> OpNode {
    OpNode::matmul("gemm", m, n, k, ElemType::Float16, ElemType::Float32)
}

fn policy(node: &OpNode) -> TensorCorePolicy {
    TensorCorePolicy::single(node.clone(), Arch::sm80())
}

fn rstep(step: usize) -> StepMap {
    StepMap::from([("k".to_string(), step)])
}

// ===== Reduction-step assignment =====

#[test_case(32, 32)]
#[test_case(64, 32)]
#[test_case(96, 32)]
#[test_case(480, 32; "large multiple of 32")]
fn step_is_32_for_multiples_of_32(dom: usize, expected: usize) {
    let node = gemm(128, 128, dom);
    assert_eq!(policy(&node).assign_reduce_step(&node)["k"], expected);
}

#[test_case(16, 16; "sixteen stays sixteen")]
#[test_case(48, 32)]
#[test_case(80, 32)]
fn step_for_multiples_of_16_not_32(dom: usize, expected: usize) {
    let node = gemm(128, 128, dom);
    assert_eq!(policy(&node).assign_reduce_step(&node)["k"], expected);
}

#[test_case(20)]
#[test_case(45)]
#[test_case(30)]
fn unaligned_domain_falls_back_to_generic_for_whole_node(dom: usize) {
    let node = gemm(128, 128, dom);
    let generic = GenericPolicy::single(node.clone(), Arch::sm80());
    assert_eq!(policy(&node).assign_reduce_step(&node), generic.assign_reduce_step(&node));
}

#[test]
fn generic_node_delegates_entirely() {
    let mut node = gemm(128, 128, 64);
    node.compute = Compute::Generic;
    let generic = GenericPolicy::single(node.clone(), Arch::sm80());
    assert_eq!(policy(&node).assign_reduce_step(&node), generic.assign_reduce_step(&node));
}

// ===== Reduction-step candidates =====

#[test]
fn candidates_are_wmma_multiples_of_domain_factors() {
    let node = gemm(128, 128, 64);
    assert_eq!(policy(&node).reduce_step_candidates(&node)["k"], vec![16, 32, 64]);

    let node = gemm(128, 128, 48);
    assert_eq!(policy(&node).reduce_step_candidates(&node)["k"], vec![16, 48]);
}

#[test]
fn candidates_delegate_for_generic_node() {
    let mut node = gemm(128, 128, 12);
    node.compute = Compute::Generic;
    assert_eq!(policy(&node).reduce_step_candidates(&node)["k"], vec![1, 2, 3, 4, 6, 12]);
}

// ===== Tile-shape validity =====

#[test_case(16, 16, true)]
#[test_case(8, 32, true)]
#[test_case(32, 8, true)]
#[test_case(48, 48, true; "multiple of 16x16")]
#[test_case(8, 8, false)]
#[test_case(8, 16, false)]
#[test_case(24, 40, false)]
fn validity_requires_a_dividing_fragment(block_m: usize, block_n: usize, valid: bool) {
    // 960 is divisible by every tile extent used here, so only the
    // fragment rule decides.
    let node = gemm(960, 960, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([block_m, block_n], rstep(32)));
    assert_eq!(p.check_tile_shape_is_valid(&td), valid);
}

#[test]
fn validity_rejects_tail_tiles() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    // Fragment-aligned, but 48 does not divide 128.
    td.insert(&node, NodeTile::new([48, 16], rstep(32)));
    assert!(!p.check_tile_shape_is_valid(&td));
}

#[test]
fn validity_rejects_missing_entry() {
    let node = gemm(128, 128, 64);
    assert!(!policy(&node).check_tile_shape_is_valid(&TileDict::new()));
}

// ===== Stride computation =====

#[test]
fn stride_plan_pads_past_the_high_axis() {
    let node = gemm(128, 128, 256);
    let p = policy(&node);
    let plan = p.tc_stride_plan(&node, &[64, 32], &rstep(32)).unwrap();

    // A stages [64, 32]: high axis 0, amount 32 + 8.
    assert_eq!(plan.main[0], Stride::new(40, 0));
    // B stages [32, 32]: high axis 0, amount 32 + 8.
    assert_eq!(plan.main[1], Stride::new(40, 0));
    // C is the tile [64, 32].
    assert_eq!(plan.main[2], Stride::new(40, 0));
}

#[test]
fn stride_plan_full_variant_differs_only_in_reduction_contribution() {
    let node = gemm(128, 128, 256);
    let p = policy(&node);
    let plan = p.tc_stride_plan(&node, &[64, 32], &rstep(32)).unwrap();

    // A's trailing dimension is K: full extent 256 vs step 32.
    assert_eq!(plan.full[0], Stride::new(264, 0));
    // B's K dimension is the high axis itself, so the trailing product is
    // unchanged; C has no reduction dimension at all.
    assert_eq!(plan.full[1], plan.main[1]);
    assert_eq!(plan.full[2], plan.main[2]);
}

#[test]
fn stride_map_applies_native_layout() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([64, 64], rstep(32)));
    let maps = p.compute_node_stride_map(&node, &td).unwrap();
    assert_eq!(maps.outputs.len(), 1);
    assert_eq!(maps.outputs[&2], Stride::NONE);
    assert!(maps.tensors.is_empty());
}

// ===== Shared-memory usage =====

#[test]
fn smem_usage_scales_with_pipeline_depth() {
    let mut node = gemm(128, 128, 64);
    node.pipeline_stage = Some(3);
    let p = policy(&node);
    let generic = GenericPolicy::single(node.clone(), Arch::sm80());

    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([64, 64], rstep(32)));

    let base = generic.infer_node_smem_usage(&td, &node).unwrap();
    let scaled = p.infer_node_smem_usage(&td, &node).unwrap();
    assert_eq!(scaled.bytes, 3 * base.bytes);
    assert_eq!(scaled.cached, base.cached);
    // A[64,32] and B[32,64] in f16.
    assert_eq!(base.bytes, (64 * 32 + 32 * 64) * 2);
}

// ===== Block-size assignment =====

#[test]
fn block_size_must_be_warp_aligned() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([128, 128], rstep(32)));
    assert_eq!(p.assign_block_size(&node, &td, 50).unwrap(), None);
}

#[test]
fn tile_must_be_fragment_aligned() {
    let node = gemm(120, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([24, 32], rstep(32)));
    assert_eq!(p.assign_block_size(&node, &td, 64).unwrap(), None);
}

#[test]
fn space_must_split_across_warps() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    // One fragment cell cannot be shared by two warps.
    td.insert(&node, NodeTile::new([16, 16], rstep(32)));
    assert_eq!(p.assign_block_size(&node, &td, 64).unwrap(), None);
}

#[test]
fn warp_tile_grows_along_the_cheapest_axis() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([128, 128], rstep(32)));

    // 4 warps over 64 fragment cells: 16 cells per warp, distributed by
    // the read-cost score into a square 4x4 fragment warp tile.
    let config = p.assign_block_size(&node, &td, 128).unwrap().unwrap();
    assert_eq!(config.block.as_slice(), &[128, 128]);
    assert_eq!(config.warp.as_slice(), &[64, 64]);
    assert!(config.use_tensor_core);
    assert_eq!(config.wmma_shape, WMMA_SHAPE);
    assert_eq!(config.reduce_step.as_slice(), &[32]);
    assert_eq!(config.pipeline_stage, 2);
    assert!(config.use_async_copy);
    assert_eq!(config.vectorize["A"], 8);
    assert_eq!(config.vectorize["B"], 8);
}

#[test]
fn warp_product_scales_by_cells_per_warp() {
    let node = gemm(256, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([64, 64], rstep(32)));

    // space = 4 * 4 = 16 cells; 2 warps -> 8 cells per warp.
    let config = p.assign_block_size(&node, &td, 64).unwrap().unwrap();
    let cells_per_warp: usize =
        config.warp.iter().zip([WMMA_SHAPE.0, WMMA_SHAPE.1]).map(|(w, f)| w / f).product();
    assert_eq!(cells_per_warp, 8);
    assert!(config.warp.iter().zip(&config.block).all(|(w, b)| b.is_multiple_of(*w)));
}

#[test]
fn generic_node_uses_base_assignment() {
    let mut node = gemm(128, 128, 64);
    node.compute = Compute::Generic;
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([64, 64], rstep(16)));

    let config = p.assign_block_size(&node, &td, 256).unwrap().unwrap();
    assert!(!config.use_tensor_core);
    assert_eq!(config.pipeline_stage, 1);
}

#[test]
fn missing_tile_entry_is_a_hard_error() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let err = p.assign_block_size(&node, &TileDict::new(), 128).unwrap_err();
    assert!(matches!(err, crate::PolicyError::MissingTile { .. }));
}

// ===== Rasterization =====

#[test]
fn tensorcore_policy_opts_out_of_rasterization() {
    let node = gemm(4096, 4096, 64);
    assert!(policy(&node).plan_rasterization(&TileDict::new()).is_none());
}

// ===== Legalization through the policy =====

#[test]
fn legalization_defaults_per_architecture() {
    let node = gemm(128, 128, 64);
    let sm80 = TensorCorePolicy::single(node.clone(), Arch::sm80());
    assert_eq!(sm80.legalization().pipeline_stage, 2);
    assert!(sm80.legalization().use_async_copy);

    let sm75 = TensorCorePolicy::single(node, Arch::sm75());
    assert_eq!(sm75.legalization().pipeline_stage, 1);
    assert!(!sm75.legalization().use_async_copy);
}

#[test]
fn config_smallvec_layout_matches_block() {
    let node = gemm(128, 128, 64);
    let p = policy(&node);
    let mut td = TileDict::new();
    td.insert(&node, NodeTile::new([128, 64], rstep(32)));
    let config = p.assign_block_size(&node, &td, 128).unwrap().unwrap();
    let expected_block: SmallVec<[usize; 4]> = smallvec![128, 64];
    assert_eq!(config.block, expected_block);
    assert_eq!(config.warp.len(), config.block.len());
}
