//! Thread-block launch-order planning.

/// Thread-block rasterization choice.
///
/// Tensor-core kernels rely on the standard launch order; the generic
/// policy switches to a column-panel order on large outputs to improve L2
/// locality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rasterization {
    /// Standard row-major launch order.
    #[default]
    None,

    /// Iterate blocks down column panels of the given width.
    Column2D { panel_width: usize },
}

impl Rasterization {
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
