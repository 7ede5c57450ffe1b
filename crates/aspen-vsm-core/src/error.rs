//! Error types for the value-stream map model.

use snafu::Snafu;

/// Result type for graph operations.
pub type Result<T, E = VsmCoreError> = std::result::Result<T, E>;

/// Errors raised while building a value-stream map.
///
/// Graph-local anomalies such as deleted pipelines are represented as node
/// state, not as errors. Only structural impossibilities end up here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum VsmCoreError {
    /// An edge referenced a node that is not in the graph.
    #[snafu(display("Node not found in value stream map: {id}"))]
    NodeNotFound {
        /// Id of the missing node.
        id: String,
    },

    /// Relocating a node would never terminate, so the graph has a cycle.
    #[snafu(display("Cyclic dependency detected while placing node {node}"))]
    CyclicDependency {
        /// Node whose placement exposed the cycle.
        node: String,
    },
}
