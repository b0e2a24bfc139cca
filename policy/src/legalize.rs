//! Construction-time legalization of tuning parameters.

use tilek_arch::Arch;
use tilek_graph::OpNode;

/// Legalized pipeline/async-copy settings for one (node, hardware) pair.
///
/// Produced once at policy construction and read-only afterwards, so a
/// policy value can be shared across concurrently evaluated candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Legalization {
    /// Software pipeline depth, >= 1.
    pub pipeline_stage: usize,

    /// Whether shared-memory staging uses hardware async copies.
    pub use_async_copy: bool,
}

impl Legalization {
    /// Resolve settings from the node's explicit overrides, falling back to
    /// architecture-class defaults: the sm_80 class gets a two-stage
    /// pipeline with async copy, everything else a single stage without.
    ///
    /// Explicit overrides are used verbatim; validating them is the
    /// caller's responsibility.
    pub fn resolve(node: &OpNode, arch: &Arch) -> Self {
        let deep = arch.compute_capability.is_sm80_class();
        Self {
            pipeline_stage: node.pipeline_stage.unwrap_or(if deep { 2 } else { 1 }),
            use_async_copy: node.use_async_copy.unwrap_or(deep),
        }
    }
}
