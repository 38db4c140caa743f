use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use weft_executor::{
  ExecutorError, ExecutorServices, NodeExecution, NodeExecutor, StatusEvent, WorkflowContext,
};

/// Discord caps message content; longer text is truncated, not rejected.
const DISCORD_CONTENT_LIMIT: usize = 2000;

/// The chat services a [`WebhookExecutor`] can post to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookService {
  Discord,
  Slack,
}

impl WebhookService {
  fn step_name(self) -> &'static str {
    match self {
      WebhookService::Discord => "discord-webhook",
      WebhookService::Slack => "slack-webhook",
    }
  }

  fn label(self) -> &'static str {
    match self {
      WebhookService::Discord => "discord",
      WebhookService::Slack => "slack",
    }
  }
}

#[derive(Debug, Deserialize, Default)]
struct WebhookConfig {
  webhook_url: Option<String>,
  content: Option<String>,
  /// Discord only; overrides the webhook's default sender name.
  username: Option<String>,
  variable_name: Option<String>,
}

/// Posts a templated message to a Discord or Slack incoming webhook and
/// stores `{"messageContent": "..."}` (the text as actually sent) under
/// the configured variable.
pub struct WebhookExecutor {
  service: WebhookService,
  http: reqwest::Client,
}

impl WebhookExecutor {
  pub fn new(service: WebhookService, http: reqwest::Client) -> Self {
    Self { service, http }
  }
}

#[async_trait]
impl NodeExecutor for WebhookExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    services.publisher.publish(StatusEvent::loading(exec.node_id));

    let config: WebhookConfig = crate::parse_config(exec.data).map_err(|err| {
      crate::config_failure(
        services.publisher,
        exec.node_id,
        format!("invalid {} configuration: {err}", self.service.label()),
      )
    })?;

    let webhook_url = match config.webhook_url.filter(|u| !u.is_empty()) {
      Some(url) => url,
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no webhook URL configured",
        ));
      }
    };
    let content = match config.content.as_deref().filter(|c| !c.is_empty()) {
      Some(content) => weft_template::resolve(content, &exec.context),
      None => {
        return Err(crate::config_failure(
          services.publisher,
          exec.node_id,
          "no message content configured",
        ));
      }
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

    let (message, body) = match self.service {
      WebhookService::Discord => {
        let message = truncate_chars(&content, DISCORD_CONTENT_LIMIT);
        let mut body = json!({"content": message});
        if let Some(username) = config
          .username
          .as_deref()
          .filter(|u| !u.is_empty())
          .map(|u| weft_template::resolve(u, &exec.context))
        {
          body["username"] = Value::String(username);
        }
        (message, body)
      }
      WebhookService::Slack => (content.clone(), json!({"text": content})),
    };

    let client = self.http.clone();
    let cancel = services.cancel.clone();
    let node_id = exec.node_id.to_string();
    let label = self.service.label();
    let result = services
      .step
      .run(
        self.service.step_name(),
        Box::pin(async move {
          let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            response = client.post(&webhook_url).json(&body).send() => {
              response.map_err(|err| {
                if err.is_timeout() || err.is_connect() {
                  ExecutorError::transient(node_id.as_str(), format!("{label} webhook failed: {err}"))
                } else {
                  ExecutorError::unexpected(node_id.as_str(), format!("{label} webhook failed: {err}"))
                }
              })?
            }
          };

          let status = response.status();
          if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("{label} webhook returned {status}: {detail}");
            return Err(
              if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                ExecutorError::transient(node_id.as_str(), message)
              } else {
                ExecutorError::unexpected(node_id.as_str(), message)
              },
            );
          }

          Ok(json!({"messageContent": message}))
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

fn truncate_chars(text: &str, limit: usize) -> String {
  text.chars().take(limit).collect()
}
