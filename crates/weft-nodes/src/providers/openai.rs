use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weft_executor::ExecutorError;

use crate::generate::{GenerateRequest, TextProvider};
use crate::providers::{classify_response, classify_transport};

/// Provider for every backend that speaks the OpenAI chat-completions
/// dialect: OpenAI itself, DeepSeek and Grok only differ in base URL,
/// model list and key.
pub struct OpenAiCompatProvider {
  name: &'static str,
  base_url: String,
  models: &'static [&'static str],
  http: reqwest::Client,
}

impl OpenAiCompatProvider {
  pub fn new(
    name: &'static str,
    base_url: impl Into<String>,
    models: &'static [&'static str],
    http: reqwest::Client,
  ) -> Self {
    Self {
      name,
      base_url: base_url.into(),
      models,
      http,
    }
  }

  pub fn openai(http: reqwest::Client) -> Self {
    Self::new(
      "openai",
      "https://api.openai.com/v1",
      &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "o3-mini"],
      http,
    )
  }

  pub fn deepseek(http: reqwest::Client) -> Self {
    Self::new(
      "deepseek",
      "https://api.deepseek.com",
      &["deepseek-chat", "deepseek-reasoner"],
      http,
    )
  }

  pub fn grok(http: reqwest::Client) -> Self {
    Self::new("grok", "https://api.x.ai/v1", &["grok-3", "grok-3-mini"], http)
  }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
  content: String,
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
  fn name(&self) -> &'static str {
    self.name
  }

  fn models(&self) -> &[&'static str] {
    self.models
  }

  async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExecutorError> {
    let body = ChatRequest {
      model: request.model,
      messages: [
        ChatMessage {
          role: "system",
          content: request.system_prompt,
        },
        ChatMessage {
          role: "user",
          content: request.user_prompt,
        },
      ],
    };

    let response = self
      .http
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(request.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|err| classify_transport(request.node_id, self.name, err))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(classify_response(request.node_id, self.name, status, &body));
    }

    let completion: ChatResponse = response
      .json()
      .await
      .map_err(|err| {
        ExecutorError::unexpected(
          request.node_id,
          format!("{} returned an unreadable completion: {err}", self.name),
        )
      })?;

    completion
      .choices
      .into_iter()
      .next()
      .map(|choice| choice.message.content)
      .ok_or_else(|| {
        ExecutorError::unexpected(
          request.node_id,
          format!("{} returned no choices", self.name),
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn request<'a>() -> GenerateRequest<'a> {
    GenerateRequest {
      node_id: "gen-1",
      api_key: "sk-test",
      model: "gpt-4o",
      system_prompt: "sys",
      user_prompt: "hello",
    }
  }

  #[tokio::test]
  async fn sends_the_chat_completions_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .and(body_partial_json(serde_json::json!({
        "model": "gpt-4o",
        "messages": [
          {"role": "system", "content": "sys"},
          {"role": "user", "content": "hello"},
        ],
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
      })))
      .mount(&server)
      .await;

    let provider =
      OpenAiCompatProvider::new("openai", server.uri(), &["gpt-4o"], reqwest::Client::new());
    let text = provider.generate(request()).await.unwrap();
    assert_eq!(text, "hi there");
  }

  #[tokio::test]
  async fn rate_limit_maps_to_a_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429))
      .mount(&server)
      .await;

    let provider =
      OpenAiCompatProvider::new("openai", server.uri(), &["gpt-4o"], reqwest::Client::new());
    let err = provider.generate(request()).await.unwrap_err();
    assert!(err.is_retriable());
  }

  #[tokio::test]
  async fn bad_credential_maps_to_a_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    let provider =
      OpenAiCompatProvider::new("openai", server.uri(), &["gpt-4o"], reqwest::Client::new());
    let err = provider.generate(request()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Configuration { .. }));
  }
}
