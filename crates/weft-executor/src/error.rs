use thiserror::Error;

/// Failure taxonomy for node execution.
///
/// The engine never retries by itself; only [`ExecutorError::Transient`]
/// failures are eligible for replay by the run-level retry policy. All
/// other variants are terminal for the run.
#[derive(Debug, Error)]
pub enum ExecutorError {
  /// Required configuration is missing or malformed. Never retried.
  #[error("node '{node_id}': {message}")]
  Configuration { node_id: String, message: String },

  /// The referenced credential does not exist for this owner. Never retried.
  #[error("node '{node_id}': credential '{credential_id}' not found")]
  CredentialNotFound {
    node_id: String,
    credential_id: String,
  },

  /// Network timeouts, upstream 5xx, rate limiting. Eligible for replay.
  #[error("node '{node_id}': transient failure: {message}")]
  Transient { node_id: String, message: String },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// Anything else. Surfaced terminally, never silently absorbed.
  #[error("node '{node_id}': {message}")]
  Unexpected { node_id: String, message: String },
}

impl ExecutorError {
  pub fn configuration(node_id: impl Into<String>, message: impl Into<String>) -> Self {
    ExecutorError::Configuration {
      node_id: node_id.into(),
      message: message.into(),
    }
  }

  pub fn transient(node_id: impl Into<String>, message: impl Into<String>) -> Self {
    ExecutorError::Transient {
      node_id: node_id.into(),
      message: message.into(),
    }
  }

  pub fn unexpected(node_id: impl Into<String>, message: impl Into<String>) -> Self {
    ExecutorError::Unexpected {
      node_id: node_id.into(),
      message: message.into(),
    }
  }

  /// Whether a run-level retry policy may replay the run after this error.
  pub fn is_retriable(&self) -> bool {
    matches!(self, ExecutorError::Transient { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_transient_errors_are_retriable() {
    assert!(ExecutorError::transient("n", "timeout").is_retriable());
    assert!(!ExecutorError::configuration("n", "missing endpoint").is_retriable());
    assert!(!ExecutorError::Cancelled.is_retriable());
    assert!(
      !ExecutorError::CredentialNotFound {
        node_id: "n".to_string(),
        credential_id: "c".to_string(),
      }
      .is_retriable()
    );
  }
}
