use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use weft_executor::{
  ExecutorError, ExecutorServices, NodeExecution, NodeExecutor, StatusEvent, WorkflowContext,
};

#[derive(Debug, Deserialize, Default)]
struct DisplayConfig {
  /// Context key to surface. When absent, the whole context is shown.
  variable_name: Option<String>,
}

/// Surfaces a context value to whoever is watching the run.
///
/// Display is purely observational: it has no side effect, writes nothing
/// into the context, and carries its output on the `success` event payload.
pub struct DisplayExecutor;

#[async_trait]
impl NodeExecutor for DisplayExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    services.publisher.publish(StatusEvent::loading(exec.node_id));

    let config: DisplayConfig = crate::parse_config(exec.data).map_err(|err| {
      crate::config_failure(
        services.publisher,
        exec.node_id,
        format!("invalid display configuration: {err}"),
      )
    })?;

    let payload = match config.variable_name.as_deref().filter(|v| !v.is_empty()) {
      Some(variable) => exec.context.get(variable).cloned().unwrap_or(Value::Null),
      None => Value::Object(exec.context.clone()),
    };

    services
      .publisher
      .publish(StatusEvent::success(exec.node_id).with_payload(payload));

    Ok(exec.context)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{Harness, context_from, execution};
  use serde_json::json;
  use weft_executor::NodeStatus;

  #[tokio::test]
  async fn surfaces_the_named_variable() {
    let harness = Harness::new();
    let data = json!({"variable_name": "answer"});
    let context = context_from(json!({"answer": {"generatedText": "hi"}}));

    let result = DisplayExecutor
      .execute(
        execution("display-1", &data, context.clone()),
        &harness.services("run-1", "display-1"),
      )
      .await
      .unwrap();

    // Context is returned unchanged.
    assert_eq!(result, context);

    let events = harness.publisher.events();
    assert_eq!(events[1].status, NodeStatus::Success);
    assert_eq!(
      events[1].payload,
      Some(json!({"generatedText": "hi"}))
    );
  }

  #[tokio::test]
  async fn defaults_to_the_whole_context() {
    let harness = Harness::new();
    let data = Value::Null;
    let context = context_from(json!({"a": 1, "b": 2}));

    DisplayExecutor
      .execute(
        execution("display-1", &data, context),
        &harness.services("run-1", "display-1"),
      )
      .await
      .unwrap();

    let events = harness.publisher.events();
    assert_eq!(events[1].payload, Some(json!({"a": 1, "b": 2})));
  }

  #[tokio::test]
  async fn missing_variable_surfaces_null() {
    let harness = Harness::new();
    let data = json!({"variable_name": "nope"});

    DisplayExecutor
      .execute(
        execution("display-1", &data, context_from(json!({"a": 1}))),
        &harness.services("run-1", "display-1"),
      )
      .await
      .unwrap();

    let events = harness.publisher.events();
    assert_eq!(events[1].payload, Some(Value::Null));
  }
}
