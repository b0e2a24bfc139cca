//! Finalized kernel configuration and search options.

use std::collections::BTreeMap;
use std::fmt;

use bon::bon;
use smallvec::SmallVec;

/// Finalized tile/warp/pipeline decisions for one accepted candidate.
///
/// Produced by `assign_block_size`, consumed by code generation. Fully
/// populated on construction and treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Thread-block tile shape, one extent per spatial axis.
    pub block: SmallVec<[usize; 4]>,

    /// Sub-tile assigned to one warp (tensor-core) or one thread (generic),
    /// same rank as `block`.
    pub warp: SmallVec<[usize; 4]>,

    pub use_tensor_core: bool,

    /// Software pipeline depth, >= 1.
    pub pipeline_stage: usize,

    /// Whether to issue hardware async copies for shared-memory staging.
    pub use_async_copy: bool,

    /// Reduction step per reduction axis, in axis order.
    pub reduce_step: SmallVec<[usize; 2]>,

    /// Tensors staged in shared memory.
    pub cached_tensors: Vec<String>,

    /// Matrix-unit shape (m, n, k).
    pub wmma_shape: (usize, usize, usize),

    /// Vector lane width per buffer (entries only where width > 1).
    pub vectorize: BTreeMap<String, usize>,
}

impl fmt::Display for KernelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block={:?} warp={:?} rstep={:?} stages={}{}{}",
            self.block.as_slice(),
            self.warp.as_slice(),
            self.reduce_step.as_slice(),
            self.pipeline_stage,
            if self.use_tensor_core { " tc" } else { "" },
            if self.use_async_copy { " async" } else { "" },
        )
    }
}

/// Options for the candidate search driver.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of ranked configurations to return.
    pub topk: usize,

    /// Thread-block sizes to try, in order.
    pub block_sizes: Vec<usize>,

    /// Shared-memory budget override in bytes; defaults to the
    /// architecture's capacity.
    pub smem_budget: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { topk: 10, block_sizes: vec![64, 128, 256, 512], smem_budget: None }
    }
}

#[bon]
impl SearchOptions {
    #[builder]
    pub fn new(
        #[builder(default = 10)] topk: usize,
        #[builder(default = vec![64, 128, 256, 512])] block_sizes: Vec<usize>,
        smem_budget: Option<usize>,
    ) -> Self {
        Self { topk, block_sizes, smem_budget }
    }

    /// Create options from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TILEK_TOPK` - Number of configurations to emit (default: 10)
    /// * `TILEK_SMEM_BUDGET` - Shared-memory budget in bytes
    pub fn from_env() -> Self {
        let topk = std::env::var("TILEK_TOPK").ok().and_then(|s| s.parse().ok()).unwrap_or(10);
        let smem_budget = std::env::var("TILEK_SMEM_BUDGET").ok().and_then(|s| s.parse().ok());
        Self { topk, smem_budget, ..Default::default() }
    }
}
