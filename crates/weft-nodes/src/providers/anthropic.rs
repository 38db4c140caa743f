use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weft_executor::ExecutorError;

use crate::generate::{GenerateRequest, TextProvider};
use crate::providers::{classify_response, classify_transport};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
  base_url: String,
  http: reqwest::Client,
}

impl AnthropicProvider {
  pub fn new(http: reqwest::Client) -> Self {
    Self {
      base_url: "https://api.anthropic.com".to_string(),
      http,
    }
  }

  #[cfg(test)]
  fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  system: &'a str,
  messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
  content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
  #[serde(default)]
  text: String,
}

#[async_trait]
impl TextProvider for AnthropicProvider {
  fn name(&self) -> &'static str {
    "anthropic"
  }

  fn models(&self) -> &[&'static str] {
    &[
      "claude-sonnet-4-20250514",
      "claude-opus-4-20250514",
      "claude-3-5-haiku-20241022",
    ]
  }

  async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExecutorError> {
    let body = MessagesRequest {
      model: request.model,
      max_tokens: MAX_TOKENS,
      system: request.system_prompt,
      messages: [UserMessage {
        role: "user",
        content: request.user_prompt,
      }],
    };

    let response = self
      .http
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", request.api_key)
      .header("anthropic-version", ANTHROPIC_VERSION)
      .json(&body)
      .send()
      .await
      .map_err(|err| classify_transport(request.node_id, self.name(), err))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(classify_response(request.node_id, self.name(), status, &body));
    }

    let message: MessagesResponse = response.json().await.map_err(|err| {
      ExecutorError::unexpected(
        request.node_id,
        format!("anthropic returned an unreadable message: {err}"),
      )
    })?;

    message
      .content
      .into_iter()
      .next()
      .map(|block| block.text)
      .ok_or_else(|| {
        ExecutorError::unexpected(request.node_id, "anthropic returned no content blocks")
      })
  }
}
