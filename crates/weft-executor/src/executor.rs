use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::WorkflowContext;
use crate::credential::CredentialStore;
use crate::error::ExecutorError;
use crate::status::StatusPublisher;
use crate::step::Step;

/// Everything node-specific about one executor invocation.
pub struct NodeExecution<'a> {
  pub node_id: &'a str,
  /// The node's raw configuration bag; the executor deserializes it into
  /// its own typed config.
  pub data: &'a serde_json::Value,
  /// Owner of the workflow, used to scope credential lookups.
  pub owner_id: &'a str,
  /// The accumulated context. Ownership transfers to the executor, which
  /// returns it extended with its output variable.
  pub context: WorkflowContext,
}

/// Shared services the engine provides to every executor invocation.
pub struct ExecutorServices<'a> {
  /// Durable step boundary, already scoped to `(run_id, node_id)`.
  pub step: Step<'a>,
  pub publisher: &'a dyn StatusPublisher,
  pub credentials: &'a dyn CredentialStore,
  /// Cooperative cancellation; executors should propagate this into
  /// in-flight network calls.
  pub cancel: &'a CancellationToken,
}

/// A type-specific node handler.
///
/// Every implementation follows the same shape:
/// 1. publish `loading` status before any work,
/// 2. validate its required configuration fields (missing field =
///    non-retriable configuration error, preceded by an `error` publish),
/// 3. resolve templated fields against the context,
/// 4. perform the side effect inside a durable step,
/// 5. on success publish `success` and return the context extended with
///    exactly one key - the configured output-variable name,
/// 6. on failure publish `error` and propagate; never catch-and-continue.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError>;
}
