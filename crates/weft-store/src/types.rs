use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Terminal (or in-flight) status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Running,
  Succeeded,
  Failed,
}

/// A workflow run as recorded for the execution-history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RunRecord {
  pub run_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  /// Final context of a successful run.
  pub result: Option<Json<serde_json::Value>>,
  /// Error message of a failed run.
  pub error: Option<String>,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl RunRecord {
  /// A freshly started run.
  pub fn started(run_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
    Self {
      run_id: run_id.into(),
      workflow_id: workflow_id.into(),
      status: RunStatus::Running,
      result: None,
      error: None,
      started_at: Utc::now(),
      completed_at: None,
    }
  }
}
