//! The durable step boundary.
//!
//! Each node wraps its side-effecting work (network call, generation call,
//! message post) in a named step. A [`StepRunner`] guarantees at-most-once
//! execution per `(run_id, node_id, step_name)`: when a run is replayed
//! after a transient failure, steps that already completed return their
//! recorded result instead of redoing the side effect.
//!
//! Only successful results are recorded; a failed step runs again on the
//! next attempt.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::ExecutorError;

/// The body of a durable step.
pub type StepFuture<'a> = BoxFuture<'a, Result<serde_json::Value, ExecutorError>>;

/// Record/replay log for durable steps.
///
/// Implementations must not poll `work` at all when a recorded result
/// exists for the key - dropping the future unpolled is what makes replay
/// side-effect free.
#[async_trait]
pub trait StepRunner: Send + Sync {
  async fn run_step(
    &self,
    run_id: &str,
    node_id: &str,
    step_name: &str,
    work: StepFuture<'_>,
  ) -> Result<serde_json::Value, ExecutorError>;
}

/// A step handle scoped to one node of one run.
///
/// The engine constructs one per node invocation so executors only name
/// their steps; the `(run_id, node_id)` part of the key is fixed here.
#[derive(Clone, Copy)]
pub struct Step<'a> {
  run_id: &'a str,
  node_id: &'a str,
  runner: &'a dyn StepRunner,
}

impl<'a> Step<'a> {
  pub fn new(run_id: &'a str, node_id: &'a str, runner: &'a dyn StepRunner) -> Self {
    Self {
      run_id,
      node_id,
      runner,
    }
  }

  /// Run `work` at most once for this node under `step_name`.
  pub async fn run(
    &self,
    step_name: &str,
    work: StepFuture<'_>,
  ) -> Result<serde_json::Value, ExecutorError> {
    self
      .runner
      .run_step(self.run_id, self.node_id, step_name, work)
      .await
  }
}
