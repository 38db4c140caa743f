use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
  /// The graph contains at least one cycle; no execution plan exists.
  #[error("workflow contains a cycle")]
  CycleDetected,

  #[error("connection references unknown node: from={from}, to={to}")]
  InvalidConnection { from: String, to: String },

  #[error("duplicate node id: {node_id}")]
  DuplicateNodeId { node_id: String },
}
