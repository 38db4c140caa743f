use async_trait::async_trait;
use serde_json::Value;
use weft_executor::{
  ExecutorError, ExecutorServices, NodeExecution, NodeExecutor, StatusEvent, WorkflowContext,
};

/// Executor for every trigger node type.
///
/// Triggers fire outside the engine; by the time a run starts their
/// payload is already the initial context. The executor therefore passes
/// the context through unchanged, but it still snapshots it in a durable
/// step so a replayed run starts from the same trigger payload.
pub struct TriggerExecutor;

#[async_trait]
impl NodeExecutor for TriggerExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    services.publisher.publish(StatusEvent::loading(exec.node_id));

    let snapshot = exec.context.clone();
    let recorded = services
      .step
      .run("trigger", Box::pin(async move { Ok(Value::Object(snapshot)) }))
      .await;

    let context = match recorded {
      Ok(Value::Object(map)) => map,
      Ok(_) => {
        services.publisher.publish(StatusEvent::error(exec.node_id));
        return Err(ExecutorError::unexpected(
          exec.node_id,
          "recorded trigger payload is not an object",
        ));
      }
      Err(err) => {
        services.publisher.publish(StatusEvent::error(exec.node_id));
        return Err(err);
      }
    };

    services.publisher.publish(StatusEvent::success(exec.node_id));
    Ok(context)
  }
}
