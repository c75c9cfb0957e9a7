//! Error types for vpipe-graph.
//!
//! Every error belongs to one [`ErrorKind`]:
//!
//! - **Configuration**: the call that caused it is rejected; graph state is unchanged.
//! - **Resource**: surface allocation failed; retry once memory is available.
//! - **Execution**: a kernel launch failed; the current frame is dropped,
//!   topology and parameters are unaffected.
//! - **Busy**: another configuration call or dispatch holds the pipeline.

use thiserror::Error;
use vpipe_compute::ComputeError;

/// Result type alias for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected configuration or topology.
    Configuration,
    /// Surface allocation failure.
    Resource,
    /// Kernel launch failure.
    Execution,
    /// Try-lock contention.
    Busy,
}

/// Layer graph, pipeline and registry errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Unknown layer type tag.
    #[error("invalid layer type '{0}'")]
    InvalidType(String),

    /// Layer name or id not in the graph.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// Layer names are unique within a graph.
    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    /// Connecting would close a cycle.
    #[error("connecting '{layer}' to upstream '{upstream}' would create a cycle")]
    CycleDetected { layer: String, upstream: String },

    /// Parameter block does not match the layer type.
    #[error("layer '{layer}' expects {expected} parameters, got {actual}")]
    ParameterTypeMismatch {
        layer: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Parameter block has the right type but an unusable value.
    #[error("invalid parameter for layer '{layer}': {reason}")]
    InvalidParameter { layer: String, reason: String },

    /// No enabled upstream could be resolved for a layer.
    #[error("layer '{0}' has no resolvable upstream")]
    DisconnectedLayer(String),

    /// Connection not allowed for this layer type.
    #[error("invalid connection for layer '{layer}': {reason}")]
    InvalidConnection { layer: String, reason: String },

    /// Upstream output cannot feed this layer.
    #[error("shape mismatch at layer '{layer}': {reason}")]
    ShapeMismatch { layer: String, reason: String },

    /// Output read from a disabled layer.
    #[error("layer '{0}' is disabled")]
    LayerDisabled(String),

    /// Input layer without a declared shape.
    #[error("input layer '{0}' has no declared shape")]
    NoInputDeclared(String),

    /// Output read before any frame completed.
    #[error("layer '{0}' has no completed frame")]
    NoFrame(String),

    /// Frame length does not match the declared input.
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    /// Registry has no pipeline with this id.
    #[error("unknown pipeline {0}")]
    UnknownPipeline(usize),

    /// Pipeline was released to the registry.
    #[error("pipeline {0} is closed")]
    PipelineClosed(usize),

    /// Requested backend cannot be created.
    #[error("backend unavailable")]
    BackendUnavailable(#[source] ComputeError),

    /// Invalid shape or channel map value.
    #[error(transparent)]
    Core(#[from] vpipe_core::Error),

    /// Surface allocation failed.
    #[error("resource error at layer '{layer}'")]
    Resource {
        layer: String,
        #[source]
        source: ComputeError,
    },

    /// Kernel launch failed.
    #[error("execution error at layer '{layer}'")]
    Execution {
        layer: String,
        #[source]
        source: ComputeError,
    },

    /// Pipeline or registry locked by another caller.
    #[error("busy: {operation} already in progress elsewhere")]
    Busy { operation: &'static str },
}

impl GraphError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resource { .. } => ErrorKind::Resource,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Busy { .. } => ErrorKind::Busy,
            _ => ErrorKind::Configuration,
        }
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Check if this is a resource error.
    pub fn is_resource(&self) -> bool {
        self.kind() == ErrorKind::Resource
    }

    /// Check if this is an execution error.
    pub fn is_execution(&self) -> bool {
        self.kind() == ErrorKind::Execution
    }

    /// Check if this is a busy error.
    pub fn is_busy(&self) -> bool {
        self.kind() == ErrorKind::Busy
    }

    pub(crate) fn resource(layer: &str, source: ComputeError) -> Self {
        Self::Resource {
            layer: layer.to_string(),
            source,
        }
    }

    pub(crate) fn execution(layer: &str, source: ComputeError) -> Self {
        Self::Execution {
            layer: layer.to_string(),
            source,
        }
    }

    pub(crate) fn shape(layer: &str, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            layer: layer.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert!(GraphError::InvalidType("x".into()).is_configuration());
        assert!(GraphError::Busy { operation: "dispatch" }.is_busy());
        let alloc = ComputeError::AllocationFailed { requested: 1, available: 0 };
        assert!(GraphError::resource("a", alloc).is_resource());
        let launch = ComputeError::LaunchFailed("boom".into());
        assert!(GraphError::execution("a", launch).is_execution());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let err = GraphError::execution("yuv2rgba", ComputeError::LaunchFailed("boom".into()));
        assert_eq!(err.to_string(), "execution error at layer 'yuv2rgba'");
        assert!(err.source().unwrap().to_string().contains("boom"));
    }
}
