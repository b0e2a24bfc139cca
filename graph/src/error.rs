use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Tensor-core axis inference requested on a generic node.
    #[snafu(display("node {node} is not tensor-core eligible"))]
    NotTensorCore { node: String },

    /// Tensor-core nodes carry exactly two inputs and at least one output.
    #[snafu(display("node {node}: expected {expected} operands, found {found}"))]
    OperandCountMismatch { node: String, expected: usize, found: usize },

    /// A matrix dimension does not appear in an operand's access map.
    #[snafu(display("node {node}: {dim} dimension not found in access map of operand {operand}"))]
    DimNotInAccessMap { node: String, operand: String, dim: &'static str },

    /// Tile rank does not match the node's spatial rank.
    #[snafu(display("tile rank mismatch: node has {expected} spatial axes, tile has {found}"))]
    TileRankMismatch { expected: usize, found: usize },

    /// An access map references a spatial axis the node does not have.
    #[snafu(display("spatial axis {axis} out of bounds (node has {max} spatial axes)"))]
    SpaceAxisOutOfBounds { axis: usize, max: usize },

    /// An access map references a reduction axis the node does not have.
    #[snafu(display("reduction axis {axis} out of bounds (node has {max} reduction axes)"))]
    ReduceAxisOutOfBounds { axis: usize, max: usize },
}
