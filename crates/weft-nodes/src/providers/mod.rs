//! Text-generation provider adapters.
//!
//! Each adapter speaks one vendor's HTTP API and nothing else; the shared
//! generation flow lives in [`GenerateTextExecutor`](crate::GenerateTextExecutor).

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatProvider;

use reqwest::StatusCode;
use tracing::warn;
use weft_executor::ExecutorError;

/// Map a non-success provider response onto the failure taxonomy.
///
/// 401/403 means the stored credential is bad, which no retry will fix;
/// 429 and 5xx are the provider's problem and worth a replay.
pub(crate) fn classify_response(
  node_id: &str,
  provider: &str,
  status: StatusCode,
  body: &str,
) -> ExecutorError {
  warn!(node_id = %node_id, provider = %provider, status = %status, "provider_request_failed");
  let body = body.chars().take(300).collect::<String>();
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExecutorError::configuration(
      node_id,
      format!("{provider} rejected the credential ({status})"),
    ),
    StatusCode::TOO_MANY_REQUESTS => {
      ExecutorError::transient(node_id, format!("{provider} rate limited the request: {body}"))
    }
    status if status.is_server_error() => {
      ExecutorError::transient(node_id, format!("{provider} returned {status}: {body}"))
    }
    status => ExecutorError::unexpected(node_id, format!("{provider} returned {status}: {body}")),
  }
}

pub(crate) fn classify_transport(
  node_id: &str,
  provider: &str,
  err: reqwest::Error,
) -> ExecutorError {
  if err.is_timeout() || err.is_connect() {
    ExecutorError::transient(node_id, format!("{provider} request failed: {err}"))
  } else {
    ExecutorError::unexpected(node_id, format!("{provider} request failed: {err}"))
  }
}
