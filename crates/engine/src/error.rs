//! Engine-level error types.

use thiserror::Error;

use nodes::HandlerError;

/// Errors produced by the flow engine (validation + execution).
///
/// Routing dead ends and step budget exhaustion are not errors: they end a
/// run normally and show up in the returned result instead.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Structural errors ------

    /// The flow has no node with the TRIGGER category.
    #[error("flow has no trigger node")]
    NoTriggerFound,

    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the flow.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },

    /// A node has several edges that would compete for the same output.
    #[error("node '{node_id}' has more than one outgoing edge for {}", describe_handle(.handle))]
    AmbiguousRouting {
        node_id: String,
        handle: Option<String>,
    },

    // ------ Execution errors ------

    /// The caller cancelled the run between two steps.
    #[error("flow execution cancelled after {steps} step(s)")]
    Cancelled { steps: usize },

    /// The run's deadline passed between two steps.
    #[error("flow execution deadline exceeded after {steps} step(s)")]
    DeadlineExceeded { steps: usize },

    /// A handler failed and the executor runs without failure recovery.
    #[error("handler '{block_id}' failed on node '{node_id}': {source}")]
    Handler {
        node_id: String,
        block_id: String,
        #[source]
        source: HandlerError,
    },

    /// A handler panicked and the executor runs without failure recovery.
    #[error("handler '{block_id}' panicked on node '{node_id}': {message}")]
    HandlerPanicked {
        node_id: String,
        block_id: String,
        message: String,
    },
}

fn describe_handle(handle: &Option<String>) -> String {
    match handle {
        Some(h) => format!("handle '{h}'"),
        None => "the default route".to_string(),
    }
}
