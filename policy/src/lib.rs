//! Tile-configuration search and scoring policies for tensor-core kernels.
//!
//! Given a computation node ([`tilek_graph::OpNode`]) and a hardware record
//! ([`tilek_arch::Arch`]), the policies here produce a search space of legal
//! tile configurations, validate each against hardware and tensor-core
//! shape constraints, and rank candidates so a code generator only has to
//! compile and benchmark the promising ones.
//!
//! # Architecture
//!
//! - [`GenericPolicy`] - base tiling policy for arbitrary nodes
//! - [`TensorCorePolicy`] - overrides the base for tensor-core-tagged
//!   nodes: matrix-unit-aligned reduction steps, fragment-shape validity,
//!   cost-scored warp-tile assignment, bank-conflict padding strides
//! - [`TilingPolicy`] - the hook contract both implement, consumed by
//!   [`emit_configs`], the candidate search driver
//!
//! Infeasible candidates are pruned silently (`None`/`false`); errors are
//! reserved for malformed node metadata.
//!
//! # Example
//!
//! ```
//! use tilek_arch::Arch;
//! use tilek_graph::{ElemType, OpNode};
//! use tilek_policy::{SearchOptions, TensorCorePolicy, emit_configs};
//!
//! let node = OpNode::matmul("gemm", 1024, 1024, 512, ElemType::Float16, ElemType::Float32);
//! let policy = TensorCorePolicy::single(node, Arch::sm80());
//! let configs = emit_configs(&policy, &SearchOptions::default()).unwrap();
//! assert!(configs.iter().all(|c| c.use_tensor_core));
//! ```

pub mod config;
pub mod error;
pub mod factor;
pub mod generic;
pub mod legalize;
pub mod rasterization;
pub mod search;
pub mod stride;
pub mod tensorcore;
pub mod tile;
pub mod traits;

#[cfg(test)]
pub mod test;

pub use config::{KernelConfig, SearchOptions};
pub use error::{PolicyError, Result};
pub use factor::{all_factors, factorize};
pub use generic::GenericPolicy;
pub use legalize::Legalization;
pub use rasterization::Rasterization;
pub use search::emit_configs;
pub use stride::{Stride, TcStridePlan};
pub use tensorcore::{FRAGMENT_SHAPES, TensorCorePolicy, WMMA_SHAPE};
pub use tile::{NodeTile, StepMap, TileDict};
pub use traits::{SmemEstimate, StepCandidates, StrideMaps, TilingPolicy};
