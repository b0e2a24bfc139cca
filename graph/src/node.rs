//! Computation-node metadata: axes, buffers, access maps, compute variant.

use std::collections::BTreeMap;

use bon::bon;
use smallvec::SmallVec;
use snafu::ensure;

use crate::dtype::ElemType;
use crate::error::*;

/// One iteration axis: a name and its full domain size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisInfo {
    pub name: String,
    pub extent: usize,
}

impl AxisInfo {
    pub fn new(name: impl Into<String>, extent: usize) -> Self {
        Self { name: name.into(), extent }
    }
}

/// Reference from a buffer dimension to the iteration axis that indexes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRef {
    /// Spatial axis, by position in the node's spatial axis list.
    Space(usize),
    /// Reduction axis, by position in the node's reduction axis list.
    Reduce(usize),
}

/// A buffer operand: shape, element type, and per-dimension access map.
///
/// `access[d]` names the iteration axis that indexes dimension `d`. Shape
/// propagation substitutes tile extents (spatial) or reduction steps
/// (reduction) along the access map to obtain the operand's staged shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub name: String,
    pub shape: SmallVec<[usize; 4]>,
    pub dtype: ElemType,
    pub access: SmallVec<[AxisRef; 4]>,
}

impl BufferInfo {
    pub fn new(
        name: impl Into<String>,
        shape: impl IntoIterator<Item = usize>,
        dtype: ElemType,
        access: impl IntoIterator<Item = AxisRef>,
    ) -> Self {
        Self { name: name.into(), shape: shape.into_iter().collect(), dtype, access: access.into_iter().collect() }
    }
}

/// Compute classification of a node.
///
/// Replaces string-keyed tag lookup: a node either is tensor-core eligible
/// (carrying the spatial positions of the matrix-multiply M and N axes) or
/// it is not. Policies match on this variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compute {
    #[default]
    Generic,
    TensorCore { axis_m: usize, axis_n: usize },
}

/// Buffer-dimension positions of the matrix axes for a tensor-core node.
///
/// `(a_m, a_k)` index into the first input's shape, `(b_k, b_n)` into the
/// second input's, `(c_m, c_n)` into the output's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorCoreAxes {
    pub a_m: usize,
    pub a_k: usize,
    pub b_k: usize,
    pub b_n: usize,
    pub c_m: usize,
    pub c_n: usize,
}

/// One computation node: loop structure, operands, and tuning tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpNode {
    pub name: String,
    pub space_axes: Vec<AxisInfo>,
    pub reduce_axes: Vec<AxisInfo>,
    pub inputs: Vec<BufferInfo>,
    pub outputs: Vec<BufferInfo>,
    pub compute: Compute,

    /// Explicit pipeline-depth override. Used verbatim by legalization.
    pub pipeline_stage: Option<usize>,

    /// Explicit async-copy override. Used verbatim by legalization.
    pub use_async_copy: Option<bool>,
}

#[bon]
impl OpNode {
    #[builder]
    pub fn new(
        name: impl Into<String>,
        space_axes: Vec<AxisInfo>,
        #[builder(default)] reduce_axes: Vec<AxisInfo>,
        inputs: Vec<BufferInfo>,
        outputs: Vec<BufferInfo>,
        #[builder(default)] compute: Compute,
        pipeline_stage: Option<usize>,
        use_async_copy: Option<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            space_axes,
            reduce_axes,
            inputs,
            outputs,
            compute,
            pipeline_stage,
            use_async_copy,
        }
    }
}

impl OpNode {
    /// Convenience constructor for a matmul-shaped node
    /// `C[i,j] = sum_k A[i,k] * B[k,j]`, tagged tensor-core on (i, j).
    pub fn matmul(name: impl Into<String>, m: usize, n: usize, k: usize, dtype: ElemType, out: ElemType) -> Self {
        Self::builder()
            .name(name)
            .space_axes(vec![AxisInfo::new("i", m), AxisInfo::new("j", n)])
            .reduce_axes(vec![AxisInfo::new("k", k)])
            .inputs(vec![
                BufferInfo::new("A", [m, k], dtype, [AxisRef::Space(0), AxisRef::Reduce(0)]),
                BufferInfo::new("B", [k, n], dtype, [AxisRef::Reduce(0), AxisRef::Space(1)]),
            ])
            .outputs(vec![BufferInfo::new("C", [m, n], out, [AxisRef::Space(0), AxisRef::Space(1)])])
            .compute(Compute::TensorCore { axis_m: 0, axis_n: 1 })
            .build()
    }

    pub fn is_tensor_core(&self) -> bool {
        matches!(self.compute, Compute::TensorCore { .. })
    }

    /// Full extents of the spatial iteration space, in axis order.
    pub fn space_extents(&self) -> SmallVec<[usize; 4]> {
        self.space_axes.iter().map(|ax| ax.extent).collect()
    }

    /// Total number of output elements.
    pub fn space_elems(&self) -> usize {
        self.space_axes.iter().map(|ax| ax.extent).product()
    }

    fn resolve_dims(&self, buffer: &BufferInfo, tile: &[usize], reduce: impl Fn(&AxisInfo) -> usize) -> Result<SmallVec<[usize; 4]>> {
        buffer
            .access
            .iter()
            .map(|r| match *r {
                AxisRef::Space(i) => {
                    ensure!(i < tile.len(), SpaceAxisOutOfBoundsSnafu { axis: i, max: tile.len() });
                    Ok(tile[i])
                }
                AxisRef::Reduce(j) => {
                    ensure!(j < self.reduce_axes.len(), ReduceAxisOutOfBoundsSnafu { axis: j, max: self.reduce_axes.len() });
                    Ok(reduce(&self.reduce_axes[j]))
                }
            })
            .collect()
    }

    /// Propagate a spatial tile through the input access maps.
    ///
    /// Reduction dimensions stay at their full extents.
    pub fn propagate_inputs(&self, tile: &[usize]) -> Result<Vec<SmallVec<[usize; 4]>>> {
        ensure!(tile.len() == self.space_axes.len(), TileRankMismatchSnafu {
            expected: self.space_axes.len(),
            found: tile.len()
        });
        self.inputs.iter().map(|buf| self.resolve_dims(buf, tile, |ax| ax.extent)).collect()
    }

    /// Propagate a spatial tile with reduction dimensions held at their
    /// chosen steps. Axes absent from `rstep` stay at full extent.
    pub fn propagate_reduction_inputs(
        &self,
        tile: &[usize],
        rstep: &BTreeMap<String, usize>,
    ) -> Result<Vec<SmallVec<[usize; 4]>>> {
        ensure!(tile.len() == self.space_axes.len(), TileRankMismatchSnafu {
            expected: self.space_axes.len(),
            found: tile.len()
        });
        self.inputs
            .iter()
            .map(|buf| self.resolve_dims(buf, tile, |ax| rstep.get(&ax.name).copied().unwrap_or(ax.extent)))
            .collect()
    }

    /// Locate the matrix dimensions inside each operand's shape.
    ///
    /// Hard failure if the node is not tensor-core tagged or the access maps
    /// do not contain the tagged axes; a present tag is assumed well-formed
    /// by the policies, so this is the one place malformed metadata surfaces.
    pub fn infer_tensorcore_axis(&self) -> Result<TensorCoreAxes> {
        let Compute::TensorCore { axis_m, axis_n } = self.compute else {
            return NotTensorCoreSnafu { node: self.name.clone() }.fail();
        };
        ensure!(self.inputs.len() == 2, OperandCountMismatchSnafu {
            node: self.name.clone(),
            expected: 2usize,
            found: self.inputs.len()
        });
        ensure!(!self.outputs.is_empty(), OperandCountMismatchSnafu {
            node: self.name.clone(),
            expected: 1usize,
            found: 0usize
        });

        let (a, b, c) = (&self.inputs[0], &self.inputs[1], &self.outputs[0]);
        let find = |buf: &BufferInfo, want: AxisRef, dim: &'static str| -> Result<usize> {
            buf.access.iter().position(|r| *r == want).ok_or_else(|| {
                DimNotInAccessMapSnafu { node: self.name.clone(), operand: buf.name.clone(), dim }.build()
            })
        };
        let find_reduce = |buf: &BufferInfo| -> Result<usize> {
            buf.access.iter().position(|r| matches!(r, AxisRef::Reduce(_))).ok_or_else(|| {
                DimNotInAccessMapSnafu { node: self.name.clone(), operand: buf.name.clone(), dim: "K" }.build()
            })
        };

        Ok(TensorCoreAxes {
            a_m: find(a, AxisRef::Space(axis_m), "M")?,
            a_k: find_reduce(a)?,
            b_k: find_reduce(b)?,
            b_n: find(b, AxisRef::Space(axis_n), "N")?,
            c_m: find(c, AxisRef::Space(axis_m), "M")?,
            c_n: find(c, AxisRef::Space(axis_n), "N")?,
        })
    }
}
