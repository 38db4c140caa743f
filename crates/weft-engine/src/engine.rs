use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use weft_executor::{
  CredentialStore, ExecutorError, ExecutorRegistry, ExecutorServices, NodeExecution,
  StatusPublisher, Step, StepRunner, WorkflowContext,
};
use weft_store::{GraphStore, RunRecord, RunStatus, RunStore, StoreError};
use weft_workflow::{Node, Workflow};

use crate::error::EngineError;

/// Run-level retry policy.
///
/// Retries replay the whole node sequence; completed durable steps inside
/// already-finished nodes are served from the step log, so only the failed
/// side effect actually runs again.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Total attempts, including the first. `1` means no retries.
  pub max_attempts: u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 1 }
  }
}

/// A finished run.
#[derive(Debug)]
pub struct RunOutcome {
  pub run_id: String,
  /// The fully accumulated context.
  pub context: WorkflowContext,
}

/// The sequential orchestration engine.
///
/// One `run` call drives one workflow from trigger payload to final
/// context: load the graph, order it, dispatch each node to its executor,
/// thread the context through, and record the terminal state. Nodes run
/// strictly one at a time; all parallelism lives above the engine (many
/// runs side by side), never inside a run.
pub struct Engine {
  graphs: Arc<dyn GraphStore>,
  runs: Arc<dyn RunStore>,
  credentials: Arc<dyn CredentialStore>,
  steps: Arc<dyn StepRunner>,
  publisher: Arc<dyn StatusPublisher>,
  registry: ExecutorRegistry,
  retry: RetryPolicy,
}

impl Engine {
  pub fn new(
    graphs: Arc<dyn GraphStore>,
    runs: Arc<dyn RunStore>,
    credentials: Arc<dyn CredentialStore>,
    steps: Arc<dyn StepRunner>,
    publisher: Arc<dyn StatusPublisher>,
    registry: ExecutorRegistry,
  ) -> Self {
    Self {
      graphs,
      runs,
      credentials,
      steps,
      publisher,
      registry,
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Execute one workflow run to completion.
  ///
  /// `initial_context` is the trigger payload. The returned context is
  /// also persisted on the run record; on failure the record carries the
  /// error message instead.
  #[instrument(skip(self, initial_context, cancel))]
  pub async fn run(
    &self,
    workflow_id: &str,
    initial_context: WorkflowContext,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, EngineError> {
    let workflow = self
      .graphs
      .get_workflow_graph(workflow_id)
      .await
      .map_err(|err| match err {
        StoreError::NotFound(_) => EngineError::WorkflowNotFound(workflow_id.to_string()),
        other => EngineError::Store(other),
      })?;

    let run_id = Uuid::new_v4().to_string();
    self
      .runs
      .create_run(&RunRecord::started(run_id.as_str(), workflow_id))
      .await?;
    info!(run_id = %run_id, workflow = %workflow.name, "workflow_started");

    match self.run_attempts(&run_id, &workflow, initial_context, &cancel).await {
      Ok(context) => {
        self
          .runs
          .complete_run(
            &run_id,
            RunStatus::Succeeded,
            Some(Value::Object(context.clone())),
            None,
            Utc::now(),
          )
          .await?;
        info!(run_id = %run_id, "workflow_succeeded");
        Ok(RunOutcome { run_id, context })
      }
      Err(err) => {
        self
          .runs
          .complete_run(&run_id, RunStatus::Failed, None, Some(err.to_string()), Utc::now())
          .await?;
        error!(run_id = %run_id, error = %err, "workflow_failed");
        Err(err)
      }
    }
  }

  async fn run_attempts(
    &self,
    run_id: &str,
    workflow: &Workflow,
    initial_context: WorkflowContext,
    cancel: &CancellationToken,
  ) -> Result<WorkflowContext, EngineError> {
    // Planning happens exactly once; an invalid graph fails the run
    // before any node executes.
    let plan = workflow.plan()?;
    debug!(run_id = %run_id, nodes = plan.len(), "workflow_planned");

    let mut attempt = 1;
    loop {
      match self
        .execute_plan(run_id, workflow, &plan, initial_context.clone(), cancel)
        .await
      {
        Ok(context) => return Ok(context),
        Err(err) if err.is_retriable() && attempt < self.retry.max_attempts => {
          warn!(run_id = %run_id, attempt, error = %err, "workflow_retrying");
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }

  async fn execute_plan(
    &self,
    run_id: &str,
    workflow: &Workflow,
    plan: &[Node],
    mut context: WorkflowContext,
    cancel: &CancellationToken,
  ) -> Result<WorkflowContext, EngineError> {
    for node in plan {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }

      let Some(executor) = self.registry.resolve(node.node_type) else {
        return Err(EngineError::UnknownNodeType {
          node_id: node.id.clone(),
          node_type: node.node_type,
        });
      };

      debug!(run_id = %run_id, node_id = %node.id, node_type = %node.node_type, "node_started");
      let exec = NodeExecution {
        node_id: &node.id,
        data: &node.data,
        owner_id: &workflow.owner_id,
        context,
      };
      let services = ExecutorServices {
        step: Step::new(run_id, &node.id, self.steps.as_ref()),
        publisher: self.publisher.as_ref(),
        credentials: self.credentials.as_ref(),
        cancel,
      };

      context = executor.execute(exec, &services).await.map_err(|err| match err {
        ExecutorError::Cancelled => EngineError::Cancelled,
        other => EngineError::Node(other),
      })?;
      debug!(run_id = %run_id, node_id = %node.id, "node_finished");
    }

    Ok(context)
  }
}
