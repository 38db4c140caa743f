//! SQLite-backed run records and durable step log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use weft_executor::{ExecutorError, StepFuture, StepRunner};

use crate::types::{RunRecord, RunStatus};
use crate::{RunStore, StoreError};

/// SQLite-based store for run records and step results.
///
/// The step-result table doubles as the durable-execution cache: because
/// it survives the process, a crashed run that is re-triggered replays its
/// completed steps instead of repeating their side effects.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Create the schema if it does not exist yet.
  pub async fn init(&self) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            CREATE TABLE IF NOT EXISTS workflow_runs (
                run_id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                error TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT
            )
            "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
            CREATE TABLE IF NOT EXISTS workflow_steps (
                run_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                step_name TEXT NOT NULL,
                result TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (run_id, node_id, step_name)
            )
            "#,
    )
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

#[async_trait]
impl RunStore for SqliteStore {
  async fn create_run(&self, run: &RunRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO workflow_runs (run_id, workflow_id, status, result, error, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&run.run_id)
    .bind(&run.workflow_id)
    .bind(run.status)
    .bind(&run.result)
    .bind(&run.error)
    .bind(run.started_at)
    .bind(run.completed_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn complete_run(
    &self,
    run_id: &str,
    status: RunStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = ?, result = ?, error = ?, completed_at = ?
            WHERE run_id = ?
            "#,
    )
    .bind(status)
    .bind(result.map(Json))
    .bind(&error)
    .bind(completed_at)
    .bind(run_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError> {
    sqlx::query_as(
      r#"
            SELECT run_id, workflow_id, status, result, error, started_at, completed_at
            FROM workflow_runs
            WHERE run_id = ?
            "#,
    )
    .bind(run_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| StoreError::NotFound(format!("run '{run_id}'")))
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunRecord>, StoreError> {
    let runs = sqlx::query_as(
      r#"
            SELECT run_id, workflow_id, status, result, error, started_at, completed_at
            FROM workflow_runs
            WHERE workflow_id = ?
            ORDER BY started_at DESC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(runs)
  }
}

#[async_trait]
impl StepRunner for SqliteStore {
  async fn run_step(
    &self,
    run_id: &str,
    node_id: &str,
    step_name: &str,
    work: StepFuture<'_>,
  ) -> Result<serde_json::Value, ExecutorError> {
    let recorded: Option<(Json<serde_json::Value>,)> = sqlx::query_as(
      r#"
            SELECT result FROM workflow_steps
            WHERE run_id = ? AND node_id = ? AND step_name = ?
            "#,
    )
    .bind(run_id)
    .bind(node_id)
    .bind(step_name)
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| ExecutorError::unexpected(node_id, format!("step log read failed: {e}")))?;

    // Replay: return the recorded result without polling `work`.
    if let Some((Json(value),)) = recorded {
      return Ok(value);
    }

    let value = work.await?;

    sqlx::query(
      r#"
            INSERT OR REPLACE INTO workflow_steps (run_id, node_id, step_name, result, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(run_id)
    .bind(node_id)
    .bind(step_name)
    .bind(Json(&value))
    .bind(Utc::now())
    .execute(&self.pool)
    .await
    .map_err(|e| ExecutorError::unexpected(node_id, format!("step log write failed: {e}")))?;

    Ok(value)
  }
}
