//! Typed errors for graph editing and parameter access.

use thiserror::Error;

/// Errors from `set_parameter` / `get_parameter` on a blend node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// The node is not bound to an evaluation pass; parameters live on the
    /// owning tree, reachable through its property bridge.
    #[error("node is not bound to an active evaluation pass")]
    InvalidState,
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}

/// Errors from blend-tree container edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    DuplicateNode(String),
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    #[error("invalid node name '{0}'")]
    InvalidName(String),
    #[error("the output node cannot be removed or replaced")]
    OutputReserved,
    #[error("input index {index} out of range for node '{node}'")]
    InputIndexOutOfRange { node: String, index: usize },
    #[error("a node cannot be connected to itself")]
    SelfConnection,
    #[error("node '{0}' is already connected")]
    ConnectionExists(String),
    #[error("input {index} of node '{node}' is already connected")]
    InputOccupied { node: String, index: usize },
    #[error("this operation requires a blend-tree container node")]
    NotAContainer,
}
