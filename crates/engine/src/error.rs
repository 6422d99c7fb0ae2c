//! Engine-level error and diagnostic types.

use thiserror::Error;

/// Structural problems found while building a graph.
///
/// None of these abort the build: the offending element is left out and
/// the rest of the graph is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphDiagnostic {
    /// A `next_steps` entry names a step that does not exist.
    #[error("step '{from}' points at unknown step '{to}'; edge dropped")]
    DanglingReference { from: String, to: String },

    /// Two steps share the same id; the later one is dropped.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// `start_step_id` names a step that does not exist; it is cleared.
    #[error("start step '{0}' is not a step of this workflow")]
    UnknownStartStep(String),

    /// A step lists the same successor more than once.
    #[error("step '{from}' lists '{to}' more than once; keeping one edge")]
    DuplicateConnection { from: String, to: String },
}

/// Errors surfaced to the session owner.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested workflow is not in the service's list.
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    /// The execution service call failed.
    #[error("execution service error: {0}")]
    Service(#[from] client::ClientError),
}
