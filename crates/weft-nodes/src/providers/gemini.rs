use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use weft_executor::ExecutorError;

use crate::generate::{GenerateRequest, TextProvider};
use crate::providers::{classify_response, classify_transport};

pub struct GeminiProvider {
  base_url: String,
  http: reqwest::Client,
}

impl GeminiProvider {
  pub fn new(http: reqwest::Client) -> Self {
    Self {
      base_url: "https://generativelanguage.googleapis.com".to_string(),
      http,
    }
  }

  #[cfg(test)]
  fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
  parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[async_trait]
impl TextProvider for GeminiProvider {
  fn name(&self) -> &'static str {
    "gemini"
  }

  fn models(&self) -> &[&'static str] {
    &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"]
  }

  async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExecutorError> {
    let body = json!({
      "system_instruction": {"parts": [{"text": request.system_prompt}]},
      "contents": [{"role": "user", "parts": [{"text": request.user_prompt}]}],
    });

    let response = self
      .http
      .post(format!(
        "{}/v1beta/models/{}:generateContent",
        self.base_url, request.model
      ))
      .header("x-goog-api-key", request.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|err| classify_transport(request.node_id, self.name(), err))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(classify_response(request.node_id, self.name(), status, &body));
    }

    let content: GenerateContentResponse = response.json().await.map_err(|err| {
      ExecutorError::unexpected(
        request.node_id,
        format!("gemini returned an unreadable response: {err}"),
      )
    })?;

    content
      .candidates
      .into_iter()
      .next()
      .and_then(|candidate| candidate.content.parts.into_iter().next())
      .map(|part| part.text)
      .ok_or_else(|| ExecutorError::unexpected(request.node_id, "gemini returned no candidates"))
  }
}
