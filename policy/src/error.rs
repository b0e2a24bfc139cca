use snafu::Snafu;

pub type Result<T, E = PolicyError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum PolicyError {
    /// Node metadata failed to resolve (malformed access maps, rank
    /// mismatches). Infeasible candidates are NOT errors; they are `None`.
    #[snafu(context(false), display("node metadata error: {source}"))]
    Node { source: tilek_graph::Error },

    /// The tile dictionary has no entry for a node the policy was asked about.
    #[snafu(display("no tile entry for node {node}"))]
    MissingTile { node: String },

    /// A reduction axis has no assigned step in the tile dictionary.
    #[snafu(display("node {node}: no reduction step assigned for axis {axis}"))]
    MissingReduceStep { node: String, axis: String },
}
