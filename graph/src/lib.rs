//! Computation-node model consumed by the tiling policies.
//!
//! An [`OpNode`] carries the loop/reduction structure of one tensor
//! computation: ordered spatial and reduction axes, input/output buffers with
//! per-dimension access maps, and a typed [`Compute`] variant that says
//! whether the node is tensor-core eligible (and if so, which spatial axes
//! are the matrix-multiply M and N dimensions).
//!
//! Shape propagation ([`OpNode::propagate_inputs`],
//! [`OpNode::propagate_reduction_inputs`]) maps a tile choice to per-operand
//! shapes, which the policies use for shared-memory sizing, stride
//! computation, and the read-cost model.

pub mod dtype;
pub mod error;
pub mod node;

pub use dtype::ElemType;
pub use error::{Error, Result};
pub use node::{AxisInfo, AxisRef, BufferInfo, Compute, OpNode, TensorCoreAxes};
