//! Weft Nodes
//!
//! The node executors that ship with weft, one per supported node type:
//!
//! - trigger nodes (manual, Google Form, Stripe) that seed the run,
//! - [`HttpRequestExecutor`] - arbitrary HTTP calls with templated
//!   endpoint, headers and body,
//! - [`GenerateTextExecutor`] - LLM text generation against OpenAI,
//!   Anthropic, Gemini, DeepSeek or Grok,
//! - [`WebhookExecutor`] - Discord and Slack message posting,
//! - [`DisplayExecutor`] - surfaces a context value to observers.
//!
//! [`default_registry`] wires all of them into an
//! [`ExecutorRegistry`](weft_executor::ExecutorRegistry) ready to hand to
//! the engine.

mod display;
mod generate;
mod http;
pub mod providers;
mod trigger;
mod webhook;

pub use display::DisplayExecutor;
pub use generate::{GenerateRequest, GenerateTextExecutor, TextProvider};
pub use http::HttpRequestExecutor;
pub use trigger::TriggerExecutor;
pub use webhook::{WebhookExecutor, WebhookService};

use std::sync::Arc;

use weft_executor::{ExecutorError, ExecutorRegistry, NodeExecutor, StatusEvent, StatusPublisher};
use weft_workflow::NodeType;

use providers::{AnthropicProvider, GeminiProvider, OpenAiCompatProvider};

/// Build the registry with every built-in executor registered.
///
/// All outbound traffic shares `http`, so connection pooling and the
/// request timeout are configured in one place by the caller.
pub fn default_registry(http: reqwest::Client) -> ExecutorRegistry {
  let mut registry = ExecutorRegistry::new();

  let trigger: Arc<dyn NodeExecutor> = Arc::new(TriggerExecutor);
  for node_type in [
    NodeType::Initial,
    NodeType::ManualTrigger,
    NodeType::GoogleFormTrigger,
    NodeType::StripeTrigger,
  ] {
    registry.register(node_type, trigger.clone());
  }

  registry.register(
    NodeType::HttpRequest,
    Arc::new(HttpRequestExecutor::new(http.clone())),
  );
  registry.register(NodeType::Display, Arc::new(DisplayExecutor));

  registry.register(
    NodeType::Openai,
    Arc::new(GenerateTextExecutor::new(Arc::new(
      OpenAiCompatProvider::openai(http.clone()),
    ))),
  );
  registry.register(
    NodeType::Deepseek,
    Arc::new(GenerateTextExecutor::new(Arc::new(
      OpenAiCompatProvider::deepseek(http.clone()),
    ))),
  );
  registry.register(
    NodeType::Grok,
    Arc::new(GenerateTextExecutor::new(Arc::new(
      OpenAiCompatProvider::grok(http.clone()),
    ))),
  );
  registry.register(
    NodeType::Anthropic,
    Arc::new(GenerateTextExecutor::new(Arc::new(AnthropicProvider::new(
      http.clone(),
    )))),
  );
  registry.register(
    NodeType::Gemini,
    Arc::new(GenerateTextExecutor::new(Arc::new(GeminiProvider::new(
      http.clone(),
    )))),
  );

  registry.register(
    NodeType::Discord,
    Arc::new(WebhookExecutor::new(WebhookService::Discord, http.clone())),
  );
  registry.register(
    NodeType::Slack,
    Arc::new(WebhookExecutor::new(WebhookService::Slack, http)),
  );

  registry
}

/// Deserialize a node's raw configuration bag.
///
/// The builder UI stores extra presentation fields alongside the ones an
/// executor cares about, so unknown fields are ignored; a `null` bag means
/// nothing was configured yet and parses as the all-default config so the
/// per-field validation can produce its specific message.
pub(crate) fn parse_config<T>(data: &serde_json::Value) -> Result<T, serde_json::Error>
where
  T: serde::de::DeserializeOwned + Default,
{
  if data.is_null() {
    return Ok(T::default());
  }
  serde_json::from_value(data.clone())
}

/// Publish an `error` status and return the configuration failure.
///
/// Validation failures always pair the two; keeping them in one place
/// stops an executor from forgetting the publish half.
pub(crate) fn config_failure(
  publisher: &dyn StatusPublisher,
  node_id: &str,
  message: impl Into<String>,
) -> ExecutorError {
  publisher.publish(StatusEvent::error(node_id));
  ExecutorError::configuration(node_id, message)
}
