//! Error types for the value-stream map service.
//!
//! [`VsmError`] carries the full internal context and is logged. Callers
//! only ever see a [`VsmFailure`]: a status code, a message key and a
//! sanitized message.
//!
//! # Tiger Style
//!
//! - All errors preserve source chains where applicable
//! - Graph-local anomalies (deleted pipelines) are node state, never errors
//! - Internal details stay in the logs, not in the returned failure

use std::fmt;

pub use aspen_vsm_core::VsmCoreError;
use serde::Serialize;
use snafu::Snafu;

use crate::accessors::AccessorError;

/// Result type for value-stream map operations.
pub type Result<T, E = VsmError> = std::result::Result<T, E>;

/// Message keys attached to failures and unauthorized nodes.
pub mod keys {
    /// Viewer may not see a pipeline.
    pub const VSM_PIPELINE_UNAUTHORIZED: &str = "VSM_PIPELINE_UNAUTHORIZED";
    /// Viewer may not see a material.
    pub const VSM_MATERIAL_UNAUTHORIZED: &str = "VSM_MATERIAL_UNAUTHORIZED";
    /// Material is unknown, or has never been recorded.
    pub const VSM_MATERIAL_NOT_FOUND: &str = "VSM_MATERIAL_NOT_FOUND";
    /// Material revision is unknown.
    pub const VSM_MODIFICATION_NOT_FOUND: &str = "VSM_MODIFICATION_NOT_FOUND";
    /// History describes a dependency cycle.
    pub const VSM_CYCLIC_DEPENDENCY: &str = "VSM_CYCLIC_DEPENDENCY";
    /// Anything else.
    pub const VSM_INTERNAL_ERROR: &str = "VSM_INTERNAL_ERROR";
}

/// HTTP-style status codes used in failures.
pub mod status {
    /// Viewer lacks permission.
    pub const UNAUTHORIZED: u16 = 401;
    /// Material or revision does not exist.
    pub const NOT_FOUND: u16 = 404;
    /// Lookup or collaborator failure.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// Graph cannot be rendered because history is cyclic.
    pub const NOT_IMPLEMENTED: u16 = 501;
}

/// Value-stream map service errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum VsmError {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// Viewer may not see the requested pipeline.
    #[snafu(display("viewer may not view pipeline {pipeline}"))]
    PipelineUnauthorized {
        /// Requested pipeline.
        pipeline: String,
    },

    /// Viewer may not see the requested material.
    #[snafu(display("viewer may not view material {fingerprint}"))]
    MaterialUnauthorized {
        /// Requested material.
        fingerprint: String,
    },

    /// The requested pipeline run does not exist.
    #[snafu(display("run {counter} of pipeline {pipeline} not found"))]
    RunNotFound {
        /// Requested pipeline.
        pipeline: String,
        /// Requested counter.
        counter: u64,
    },

    /// No pipeline declares the requested material.
    #[snafu(display("material {fingerprint} not configured"))]
    MaterialNotFound {
        /// Requested material.
        fingerprint: String,
    },

    /// The material is configured but has never been recorded.
    #[snafu(display("material {fingerprint} has no recorded instance"))]
    MaterialInstanceNotFound {
        /// Requested material.
        fingerprint: String,
    },

    /// The material has no modification with the requested revision.
    #[snafu(display("modification {revision} of material {fingerprint} not found"))]
    ModificationNotFound {
        /// Requested material.
        fingerprint: String,
        /// Requested revision.
        revision: String,
    },

    // ========================================================================
    // Graph Errors
    // ========================================================================
    /// A collaborator call failed.
    #[snafu(display("collaborator call {operation} failed: {source}"))]
    Accessor {
        /// Collaborator operation that failed.
        operation: &'static str,
        /// Underlying collaborator error.
        source: AccessorError,
    },

    /// The graph rejected an edge.
    #[snafu(display("graph construction failed: {source}"))]
    Graph {
        /// Underlying graph error.
        source: VsmCoreError,
    },

    /// Trigger history names a node the graph never discovered.
    #[snafu(display("trigger history references unknown node {id}"))]
    UnknownNode {
        /// Id of the node.
        id: String,
    },

    /// The finished graph contains a cycle.
    #[snafu(display("value stream map of {root} contains a cycle"))]
    CyclicDependency {
        /// Root node of the graph.
        root: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Service configuration too large.
    #[snafu(display("value stream map config too large: {size} bytes (max: {max})"))]
    ConfigTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Service configuration could not be parsed.
    #[snafu(display("failed to parse value stream map config: {source}"))]
    ParseConfig {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Service configuration is invalid.
    #[snafu(display("invalid value stream map config: {reason}"))]
    InvalidConfig {
        /// Reason for invalidity.
        reason: String,
    },
}

impl VsmError {
    /// Whether the error means the history forms a cycle.
    pub fn is_cyclic(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency { .. }
                | Self::Graph {
                    source: VsmCoreError::CyclicDependency { .. }
                }
        )
    }
}

/// Failure returned to callers instead of a value-stream map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VsmFailure {
    /// HTTP-style status code.
    pub status: u16,
    /// Localizable message key.
    pub message_key: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl VsmFailure {
    /// Create a failure.
    pub fn new(status: u16, message_key: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message_key,
            message: message.into(),
        }
    }
}

impl fmt::Display for VsmFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.message_key, self.message)
    }
}

impl std::error::Error for VsmFailure {}
