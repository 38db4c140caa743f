use thiserror::Error;
use weft_executor::ExecutorError;
use weft_store::StoreError;
use weft_workflow::{NodeType, WorkflowError};

/// Run-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
  /// No graph exists for the requested workflow id.
  #[error("workflow '{0}' not found")]
  WorkflowNotFound(String),

  /// The stored graph failed validation (cycle, dangling connection, ...).
  /// Raised before any node executes.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// A node's type has no registered executor. A configuration problem,
  /// never a silent skip.
  #[error("node '{node_id}' has no executor for type '{node_type}'")]
  UnknownNodeType {
    node_id: String,
    node_type: NodeType,
  },

  /// A node executor failed; the run stops at that node.
  #[error(transparent)]
  Node(#[from] ExecutorError),

  /// Run bookkeeping failed.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// The run was cancelled.
  #[error("run cancelled")]
  Cancelled,
}

impl EngineError {
  /// Whether the retry policy may replay the run after this error.
  pub fn is_retriable(&self) -> bool {
    matches!(self, EngineError::Node(err) if err.is_retriable())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_transient_node_errors_are_retriable() {
    assert!(EngineError::Node(ExecutorError::transient("n", "x")).is_retriable());
    assert!(!EngineError::Node(ExecutorError::configuration("n", "x")).is_retriable());
    assert!(!EngineError::Workflow(WorkflowError::CycleDetected).is_retriable());
    assert!(!EngineError::Cancelled.is_retriable());
  }
}
