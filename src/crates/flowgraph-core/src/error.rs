//! Engine error taxonomy
//!
//! Errors fall into two families with different handling policies:
//!
//! - **Caller-facing, recoverable**: [`EngineError::NotFound`],
//!   [`EngineError::Conflict`], [`EngineError::AlreadyTerminal`]. Surfaced as
//!   `Err` from the control surface; the caller may retry later.
//! - **Run-terminating**: [`EngineError::Routing`] and
//!   [`EngineError::NodeExecution`] are caught at the executor boundary and
//!   converted to a terminal `Errored` run result. They move the conversation
//!   to `Error` status but never crash the engine process; the last good
//!   checkpoint stays readable and the conversation can be retried once the
//!   external cause is resolved.
//!
//! [`EngineError::Configuration`] is raised only at graph build time: bad
//! wiring fails fast and is never retried at run time.

use flowgraph_checkpoint::StoreError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by graph construction and execution
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad graph wiring, detected when the graph is built
    ///
    /// Fatal at build time: an edge from an unregistered node, a branch
    /// target that does not exist, a reserved node name, a node with no
    /// outgoing edge. Never retried.
    #[error("Graph configuration error: {0}")]
    Configuration(String),

    /// Unknown conversation id
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// Concurrent run on a busy conversation, or a run started on an
    /// interrupted conversation without a resume value
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Router returned a label with no entry in the edge's branch map
    ///
    /// A programming error, not a user error: the run terminates as
    /// `Errored`, the conversation moves to `Error` status, and the engine
    /// does not retry.
    #[error("Router after node '{node}' returned unmapped label '{label}'")]
    Routing { node: String, label: String },

    /// A node's own logic failed
    ///
    /// Caught per node at the executor boundary. State from before the
    /// failing node is preserved intact.
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// Operation on a run that already reached a terminal status
    #[error("Run already terminal: {0}")]
    AlreadyTerminal(String),

    /// Checkpoint store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a routing error
    pub fn routing(node: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Routing {
            node: node.into(),
            label: label.into(),
        }
    }

    /// Create a node execution error
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }
}
