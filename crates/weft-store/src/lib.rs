//! Weft Store
//!
//! Storage traits for the engine's external collaborators, plus the
//! implementations that ship with weft:
//!
//! - [`GraphStore`] - returns the persisted node/connection graph for a
//!   workflow id. Graph persistence itself lives outside the engine; the
//!   engine only ever reads.
//! - [`RunStore`] - run records for the execution-history view (terminal
//!   status, result, error message, timestamps).
//! - In-memory implementations of every collaborator trait, used by tests
//!   and the CLI ([`MemoryGraphStore`], [`MemoryRunStore`],
//!   [`MemoryCredentialStore`], [`MemoryStepLog`]).
//! - [`SqliteStore`] - persists run records and the durable step-result
//!   cache to SQLite.

mod memory;
mod sqlite;
mod types;

pub use memory::{MemoryCredentialStore, MemoryGraphStore, MemoryRunStore, MemoryStepLog};
pub use sqlite::SqliteStore;
pub use types::{RunRecord, RunStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use weft_workflow::Workflow;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Read access to persisted workflow graphs.
#[async_trait]
pub trait GraphStore: Send + Sync {
  /// Fetch the full graph (nodes, connections, owner) for a workflow id.
  async fn get_workflow_graph(&self, workflow_id: &str) -> Result<Workflow, StoreError>;
}

/// Persistence for workflow run records.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Record a newly started run.
  async fn create_run(&self, run: &RunRecord) -> Result<(), StoreError>;

  /// Record a run's terminal state.
  async fn complete_run(
    &self,
    run_id: &str,
    status: RunStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
    completed_at: DateTime<Utc>,
  ) -> Result<(), StoreError>;

  /// Get a run record by id.
  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError>;

  /// List run records for a workflow, most recent first.
  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunRecord>, StoreError>;
}
