//! Hardware capability records consumed by the tiling policies.
//!
//! An [`Arch`] describes the raw numbers a policy needs to legalize and score
//! tile configurations: warp size, shared-memory capacity, a bandwidth table
//! keyed by memory scope, and the compute-capability tag that gates
//! software-pipelining and async-copy defaults.
//!
//! Construction follows the named-constructor convention
//! (`Arch::sm80()`, `Arch::sm75()`, ...), one per supported architecture.

/// CUDA compute-capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(strum::Display, strum::VariantArray)]
pub enum ComputeCapability {
    #[strum(serialize = "sm_70")]
    Sm70,
    #[strum(serialize = "sm_75")]
    Sm75,
    #[strum(serialize = "sm_80")]
    Sm80,
    #[strum(serialize = "sm_86")]
    Sm86,
    #[strum(serialize = "sm_89")]
    Sm89,
    #[strum(serialize = "sm_90")]
    Sm90,
}

impl ComputeCapability {
    /// True for the sm_80 architecture class (Ampere and later).
    ///
    /// This class gets deeper software pipelines and hardware async copy
    /// (`cp.async`) by default.
    pub const fn is_sm80_class(&self) -> bool {
        matches!(self, Self::Sm80 | Self::Sm86 | Self::Sm89 | Self::Sm90)
    }
}

/// Memory scope used to pick a bandwidth tier when scoring data movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemScope {
    /// Device global memory.
    Global,
    /// On-chip shared memory.
    Shared,
}

/// Hardware capability record for one target device.
#[derive(Debug, Clone)]
pub struct Arch {
    /// Device identifier (e.g., "A100").
    pub device: &'static str,

    /// Compute-capability tag.
    pub compute_capability: ComputeCapability,

    /// Threads per warp.
    pub warp_size: usize,

    /// Maximum threads per thread block.
    pub max_threads_per_block: usize,

    /// Shared memory capacity per thread block, in bytes.
    pub smem_cap: usize,

    /// Register file capacity per thread block, in 32-bit registers.
    pub reg_cap: usize,

    /// Global-memory bandwidth, GB/s. Used as a cost-model weight, not a
    /// measured value.
    pub bandwidth_global: f64,

    /// Shared-memory bandwidth, GB/s.
    pub bandwidth_shared: f64,
}

impl Arch {
    /// Bandwidth for a memory scope, GB/s.
    pub fn bandwidth(&self, scope: MemScope) -> f64 {
        match scope {
            MemScope::Global => self.bandwidth_global,
            MemScope::Shared => self.bandwidth_shared,
        }
    }

    /// V100 (Volta).
    pub fn sm70() -> Self {
        Self {
            device: "V100",
            compute_capability: ComputeCapability::Sm70,
            warp_size: 32,
            max_threads_per_block: 1024,
            smem_cap: 96 * 1024,
            reg_cap: 65536,
            bandwidth_global: 900.0,
            bandwidth_shared: 12080.0,
        }
    }

    /// T4 / RTX 20xx (Turing).
    pub fn sm75() -> Self {
        Self {
            device: "T4",
            compute_capability: ComputeCapability::Sm75,
            warp_size: 32,
            max_threads_per_block: 1024,
            smem_cap: 64 * 1024,
            reg_cap: 65536,
            bandwidth_global: 320.0,
            bandwidth_shared: 6000.0,
        }
    }

    /// A100 (Ampere).
    pub fn sm80() -> Self {
        Self {
            device: "A100",
            compute_capability: ComputeCapability::Sm80,
            warp_size: 32,
            max_threads_per_block: 1024,
            smem_cap: 163 * 1024,
            reg_cap: 65536,
            bandwidth_global: 1555.0,
            bandwidth_shared: 13400.0,
        }
    }

    /// RTX 40xx (Ada).
    pub fn sm89() -> Self {
        Self {
            device: "RTX4090",
            compute_capability: ComputeCapability::Sm89,
            warp_size: 32,
            max_threads_per_block: 1024,
            smem_cap: 100 * 1024,
            reg_cap: 65536,
            bandwidth_global: 1008.0,
            bandwidth_shared: 12800.0,
        }
    }
}
