use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use weft_executor::{
  ExecutorError, ExecutorServices, NodeExecution, NodeExecutor, StatusEvent, WorkflowContext,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant";

/// One resolved generation call, ready for a provider.
pub struct GenerateRequest<'a> {
  pub node_id: &'a str,
  pub api_key: &'a str,
  pub model: &'a str,
  pub system_prompt: &'a str,
  pub user_prompt: &'a str,
}

/// A text-generation backend (OpenAI, Anthropic, Gemini, ...).
///
/// Providers are pure API adapters: prompt resolution, credential lookup
/// and durability all live in [`GenerateTextExecutor`].
#[async_trait]
pub trait TextProvider: Send + Sync {
  fn name(&self) -> &'static str;

  /// Models this provider accepts, preferred first.
  fn models(&self) -> &[&'static str];

  fn default_model(&self) -> &'static str {
    self.models().first().copied().unwrap_or("")
  }

  async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExecutorError>;
}

#[derive(Debug, Deserialize, Default)]
struct GenerateTextConfig {
  model: Option<String>,
  system_prompt: Option<String>,
  user_prompt: Option<String>,
  credential_id: Option<String>,
  variable_name: Option<String>,
}

/// Generates text with the configured provider and stores the result under
/// the configured variable as `{"generatedText": "..."}`.
///
/// Two durable steps: `get-credential` (so a replay does not re-read the
/// secret store) and `generate-text` (so a replay does not pay for the
/// same completion twice).
pub struct GenerateTextExecutor {
  provider: Arc<dyn TextProvider>,
}

impl GenerateTextExecutor {
  pub fn new(provider: Arc<dyn TextProvider>) -> Self {
    Self { provider }
  }
}

#[async_trait]
impl NodeExecutor for GenerateTextExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    services.publisher.publish(StatusEvent::loading(exec.node_id));

    let config: GenerateTextConfig = crate::parse_config(exec.data).map_err(|err| {
      crate::config_failure(
        services.publisher,
        exec.node_id,
        format!("invalid {} configuration: {err}", self.provider.name()),
      )
    })?;

    let variable = match config.variable_name.filter(|v| !v.is_empty()) {
      Some(variable) => variable,
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no output variable configured",
        ));
      }
    };
    let credential_id = match config.credential_id.filter(|c| !c.is_empty()) {
      Some(credential_id) => credential_id,
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no credential configured",
        ));
      }
    };
    let user_prompt = match config.user_prompt.as_deref().filter(|p| !p.is_empty()) {
      Some(prompt) => weft_template::resolve(prompt, &exec.context),
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no user prompt configured",
        ));
      }
    };
    let system_prompt = match config.system_prompt.as_deref().filter(|p| !p.is_empty()) {
      Some(prompt) => weft_template::resolve(prompt, &exec.context),
      None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };
    let model = config
      .model
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| self.provider.default_model().to_string());

    let credential = {
      let credentials = services.credentials;
      let owner_id = exec.owner_id;
      let node_id = exec.node_id;
      let credential_id = credential_id.clone();
      services
        .step
        .run(
          "get-credential",
          Box::pin(async move {
            match credentials.get_credential(&credential_id, owner_id).await? {
              Some(credential) => Ok(json!({"id": credential.id, "value": credential.value})),
              None => Err(ExecutorError::CredentialNotFound {
                node_id: node_id.to_string(),
                credential_id,
              }),
            }
          }),
        )
        .await
    };
    let credential = match credential {
      Ok(credential) => credential,
      Err(err) => {
        services.publisher.publish(StatusEvent::error(exec.node_id));
        return Err(err);
      }
    };
    let Some(api_key) = credential.get("value").and_then(|v| v.as_str()).map(String::from)
    else {
      services.publisher.publish(StatusEvent::error(exec.node_id));
      return Err(ExecutorError::unexpected(
        exec.node_id,
        "recorded credential has no value",
      ));
    };

    let provider = self.provider.clone();
    let cancel = services.cancel.clone();
    let node_id = exec.node_id.to_string();
    let result = services
      .step
      .run(
        "generate-text",
        Box::pin(async move {
          let request = GenerateRequest {
            node_id: &node_id,
            api_key: &api_key,
            model: &model,
            system_prompt: &system_prompt,
            user_prompt: &user_prompt,
          };
          let text = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            text = provider.generate(request) => text?,
          };
          Ok(json!({"generatedText": text}))
        }),
      )
      .await;

    let payload = match result {
      Ok(payload) => payload,
      Err(err) => {
        services.publisher.publish(StatusEvent::error(exec.node_id));
        return Err(err);
      }
    };

    let mut context = exec.context;
    context.insert(variable, payload);
    services.publisher.publish(StatusEvent::success(exec.node_id));
    Ok(context)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{Harness, context_from, execution};
  use std::sync::Mutex;
  use weft_executor::NodeStatus;

  #[derive(Default)]
  struct FakeProvider {
    calls: Mutex<Vec<(String, String, String, String)>>,
    fail_once: Mutex<bool>,
  }

  impl FakeProvider {
    fn flaky() -> Self {
      Self {
        fail_once: Mutex::new(true),
        ..Self::default()
      }
    }

    fn calls(&self) -> Vec<(String, String, String, String)> {
      self.calls.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl TextProvider for FakeProvider {
    fn name(&self) -> &'static str {
      "fake"
    }

    fn models(&self) -> &[&'static str] {
      &["fake-large", "fake-small"]
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExecutorError> {
      self.calls.lock().unwrap().push((
        request.api_key.to_string(),
        request.model.to_string(),
        request.system_prompt.to_string(),
        request.user_prompt.to_string(),
      ));
      let mut fail_once = self.fail_once.lock().unwrap();
      if *fail_once {
        *fail_once = false;
        return Err(ExecutorError::transient(request.node_id, "rate limited"));
      }
      Ok(format!("echo: {}", request.user_prompt))
    }
  }

  fn data() -> serde_json::Value {
    serde_json::json!({
      "credential_id": "cred-1",
      "user_prompt": "Summarize {{page.title}}",
      "variable_name": "summary",
    })
  }

  #[tokio::test]
  async fn generates_with_resolved_prompt_and_defaults() {
    let provider = Arc::new(FakeProvider::default());
    let executor = GenerateTextExecutor::new(provider.clone());
    let harness = Harness::new();
    harness.credentials.insert("owner-1", "cred-1", "sk-test");
    let data = data();
    let context = context_from(serde_json::json!({"page": {"title": "Weft"}}));

    let result = executor
      .execute(
        execution("gen-1", &data, context),
        &harness.services("run-1", "gen-1"),
      )
      .await
      .unwrap();

    assert_eq!(
      result.get("summary"),
      Some(&serde_json::json!({"generatedText": "echo: Summarize Weft"}))
    );

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let (api_key, model, system_prompt, user_prompt) = &calls[0];
    assert_eq!(api_key, "sk-test");
    assert_eq!(model, "fake-large");
    assert_eq!(system_prompt, DEFAULT_SYSTEM_PROMPT);
    assert_eq!(user_prompt, "Summarize Weft");

    assert_eq!(
      harness.publisher.statuses(),
      vec![NodeStatus::Loading, NodeStatus::Success]
    );
  }

  #[tokio::test]
  async fn missing_credential_is_terminal() {
    let executor = GenerateTextExecutor::new(Arc::new(FakeProvider::default()));
    let harness = Harness::new();
    let data = data();

    let err = executor
      .execute(
        execution("gen-1", &data, Default::default()),
        &harness.services("run-1", "gen-1"),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, ExecutorError::CredentialNotFound { .. }));
    assert!(!err.is_retriable());
    assert_eq!(
      harness.publisher.statuses(),
      vec![NodeStatus::Loading, NodeStatus::Error]
    );
  }

  #[tokio::test]
  async fn missing_user_prompt_is_a_configuration_error() {
    let executor = GenerateTextExecutor::new(Arc::new(FakeProvider::default()));
    let harness = Harness::new();
    let data = serde_json::json!({"credential_id": "c", "variable_name": "v"});

    let err = executor
      .execute(
        execution("gen-1", &data, Default::default()),
        &harness.services("run-1", "gen-1"),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, ExecutorError::Configuration { .. }));
  }

  #[tokio::test]
  async fn replay_reuses_the_recorded_completion() {
    let provider = Arc::new(FakeProvider::default());
    let executor = GenerateTextExecutor::new(provider.clone());
    let harness = Harness::new();
    harness.credentials.insert("owner-1", "cred-1", "sk-test");
    let data = data();

    for _ in 0..2 {
      executor
        .execute(
          execution("gen-1", &data, Default::default()),
          &harness.services("run-1", "gen-1"),
        )
        .await
        .unwrap();
    }

    assert_eq!(provider.calls().len(), 1);
    // get-credential and generate-text.
    assert_eq!(harness.steps.recorded(), 2);
  }

  #[tokio::test]
  async fn cancellation_aborts_an_in_flight_generation() {
    use std::time::Duration;

    /// Never completes; the call only ends through cancellation.
    struct StallingProvider;

    #[async_trait]
    impl TextProvider for StallingProvider {
      fn name(&self) -> &'static str {
        "stalling"
      }

      fn models(&self) -> &[&'static str] {
        &["stall-1"]
      }

      async fn generate(&self, _request: GenerateRequest<'_>) -> Result<String, ExecutorError> {
        std::future::pending().await
      }
    }

    let executor = GenerateTextExecutor::new(Arc::new(StallingProvider));
    let harness = Harness::new();
    harness.credentials.insert("owner-1", "cred-1", "sk-test");
    let data = data();

    let cancel = harness.cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(50)).await;
      cancel.cancel();
    });

    let err = executor
      .execute(
        execution("gen-1", &data, Default::default()),
        &harness.services("run-1", "gen-1"),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, ExecutorError::Cancelled));
    // The credential step completed before the cancel; the aborted
    // generation recorded nothing.
    assert_eq!(harness.steps.recorded(), 1);
  }

  #[tokio::test]
  async fn transient_failure_is_retried_but_credential_step_is_not_rerun() {
    let provider = Arc::new(FakeProvider::flaky());
    let executor = GenerateTextExecutor::new(provider.clone());
    let harness = Harness::new();
    harness.credentials.insert("owner-1", "cred-1", "sk-test");
    let data = data();

    let first = executor
      .execute(
        execution("gen-1", &data, Default::default()),
        &harness.services("run-1", "gen-1"),
      )
      .await;
    assert!(matches!(first, Err(ExecutorError::Transient { .. })));
    // Only get-credential was recorded.
    assert_eq!(harness.steps.recorded(), 1);

    executor
      .execute(
        execution("gen-1", &data, Default::default()),
        &harness.services("run-1", "gen-1"),
      )
      .await
      .unwrap();
    assert_eq!(provider.calls().len(), 2);
  }
}
