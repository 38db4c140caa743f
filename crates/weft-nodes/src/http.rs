use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use weft_executor::{
  ExecutorError, ExecutorServices, NodeExecution, NodeExecutor, StatusEvent, WorkflowContext,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum HttpMethod {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl HttpMethod {
  fn as_reqwest(self) -> reqwest::Method {
    match self {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Patch => reqwest::Method::PATCH,
      HttpMethod::Delete => reqwest::Method::DELETE,
    }
  }

  fn sends_body(self) -> bool {
    matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
  }
}

#[derive(Debug, Deserialize, Default)]
struct HttpRequestConfig {
  endpoint: Option<String>,
  method: Option<HttpMethod>,
  /// Either a free-text block (JSON object, `key: value` lines, or a
  /// comma-separated single line) or an already-structured object.
  headers: Option<Value>,
  body: Option<String>,
  variable_name: Option<String>,
}

/// Performs one templated HTTP request and stores the response under the
/// configured variable as `{"httpResponse": {status, statusText, data}}`.
///
/// A non-2xx response is still data: the request succeeded at the
/// transport level and downstream nodes get to branch on the status code.
pub struct HttpRequestExecutor {
  http: reqwest::Client,
}

impl HttpRequestExecutor {
  pub fn new(http: reqwest::Client) -> Self {
    Self { http }
  }
}

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    services.publisher.publish(StatusEvent::loading(exec.node_id));

    let config: HttpRequestConfig = crate::parse_config(exec.data).map_err(|err| {
      crate::config_failure(
        services.publisher,
        exec.node_id,
        format!("invalid http-request configuration: {err}"),
      )
    })?;

    let endpoint = match config.endpoint.as_deref().filter(|e| !e.is_empty()) {
      Some(endpoint) => endpoint,
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no endpoint configured",
        ));
      }
    };
    let Some(method) = config.method else {
      return Err(crate::config_failure(
        services.publisher,
        exec.node_id,
        "no HTTP method configured",
      ));
    };
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

    // Templates resolve outside the durable step so a replayed run reuses
    // the recorded response even if the context text changed.
    let url = weft_template::resolve(endpoint, &exec.context);

    let header_pairs = match &config.headers {
      None | Some(Value::Null) => Vec::new(),
      Some(Value::String(raw)) => {
        let resolved = weft_template::resolve(raw, &exec.context);
        parse_headers(&resolved).map_err(|message| {
          crate::config_failure(services.publisher, exec.node_id, message)
        })?
      }
      Some(Value::Object(map)) => map
        .iter()
        .map(|(key, value)| (key.clone(), header_value_text(value, &exec.context)))
        .collect(),
      Some(_) => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "headers must be a string or an object",
        ));
      }
    };

    let mut headers = HeaderMap::new();
    for (key, value) in &header_pairs {
      let name = HeaderName::from_bytes(key.trim().as_bytes()).map_err(|_| {
        crate::config_failure(
          services.publisher,
          exec.node_id,
          format!("invalid header name '{key}'"),
        )
      })?;
      let value = HeaderValue::from_str(value.trim()).map_err(|_| {
        crate::config_failure(
          services.publisher,
          exec.node_id,
          format!("invalid value for header '{key}'"),
        )
      })?;
      headers.insert(name, value);
    }

    let body = if method.sends_body() {
      let raw = config.body.as_deref().unwrap_or("{}");
      let resolved = weft_template::resolve(raw, &exec.context);
      if serde_json::from_str::<Value>(&resolved).is_err() {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "request body is not valid JSON after template resolution",
        ));
      }
      if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
      }
      Some(resolved)
    } else {
      None
    };

    let client = self.http.clone();
    let cancel = services.cancel.clone();
    let node_id = exec.node_id.to_string();
    let result = services
      .step
      .run(
        "http-request",
        Box::pin(async move {
          let mut request = client
            .request(method.as_reqwest(), &url)
            .headers(headers)
            .timeout(REQUEST_TIMEOUT);
          if let Some(body) = body {
            request = request.body(body);
          }

          let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            response = request.send() => {
              response.map_err(|err| classify_transport_error(&node_id, err))?
            }
          };

          let status = response.status();
          let status_text = status.canonical_reason().unwrap_or_default().to_string();
          let data = if status == reqwest::StatusCode::NO_CONTENT {
            Value::Null
          } else {
            let text = response
              .text()
              .await
              .map_err(|err| classify_transport_error(&node_id, err))?;
            if text.is_empty() {
              Value::Null
            } else {
              // Non-JSON bodies are kept verbatim as a string.
              serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
          };

          Ok(json!({
            "httpResponse": {
              "status": status.as_u16(),
              "statusText": status_text,
              "data": data,
            }
          }))
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

/// Timeouts and connection failures are worth a retry; everything else
/// about the transport is not.
fn classify_transport_error(node_id: &str, err: reqwest::Error) -> ExecutorError {
  warn!(node_id = %node_id, error = %err, "http_request_failed");
  if err.is_timeout() || err.is_connect() {
    ExecutorError::transient(node_id, format!("request failed: {err}"))
  } else {
    ExecutorError::unexpected(node_id, format!("request failed: {err}"))
  }
}

fn header_value_text(value: &Value, context: &WorkflowContext) -> String {
  match value {
    Value::String(text) => weft_template::resolve(text, context),
    other => other.to_string(),
  }
}

/// Parse the free-text header field.
///
/// Accepted shapes, tried in order: a JSON object, one `key: value` or
/// `key=value` entry per line, or a single comma-separated line.
fn parse_headers(raw: &str) -> Result<Vec<(String, String)>, String> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(Vec::new());
  }

  if let Ok(Value::Object(map)) = serde_json::from_str(raw) {
    return Ok(
      map
        .into_iter()
        .map(|(key, value)| {
          let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
          };
          (key, text)
        })
        .collect(),
    );
  }

  let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
  let entries: Vec<&str> = if lines.len() == 1 {
    lines[0].split(',').map(str::trim).collect()
  } else {
    lines
  };

  let mut pairs = Vec::with_capacity(entries.len());
  for entry in entries {
    let (key, value) = entry
      .split_once(':')
      .or_else(|| entry.split_once('='))
      .ok_or_else(|| format!("malformed header entry '{entry}'"))?;
    let key = key.trim();
    if key.is_empty() {
      return Err(format!("malformed header entry '{entry}'"));
    }
    pairs.push((key.to_string(), value.trim().to_string()));
  }
  Ok(pairs)
}
