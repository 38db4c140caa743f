//! In-memory collaborator implementations.
//!
//! These back the CLI's single-process mode and the test suite. They hold
//! their state behind `Arc<RwLock<..>>` so clones share one store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use weft_executor::{Credential, CredentialStore, ExecutorError, StepFuture, StepRunner};
use weft_workflow::Workflow;

use crate::types::{RunRecord, RunStatus};
use crate::{GraphStore, RunStore, StoreError};

/// Workflow graphs held in memory, keyed by workflow id.
#[derive(Clone, Default)]
pub struct MemoryGraphStore {
  workflows: Arc<RwLock<HashMap<String, Workflow>>>,
}

impl MemoryGraphStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, workflow: Workflow) {
    self
      .workflows
      .write()
      .unwrap()
      .insert(workflow.workflow_id.clone(), workflow);
  }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
  async fn get_workflow_graph(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
    self
      .workflows
      .read()
      .unwrap()
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("workflow '{workflow_id}'")))
  }
}

/// Run records held in memory.
#[derive(Clone, Default)]
pub struct MemoryRunStore {
  runs: Arc<RwLock<Vec<RunRecord>>>,
}

impl MemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl RunStore for MemoryRunStore {
  async fn create_run(&self, run: &RunRecord) -> Result<(), StoreError> {
    self.runs.write().unwrap().push(run.clone());
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
    let mut runs = self.runs.write().unwrap();
    let run = runs
      .iter_mut()
      .find(|r| r.run_id == run_id)
      .ok_or_else(|| StoreError::NotFound(format!("run '{run_id}'")))?;
    run.status = status;
    run.result = result.map(Json);
    run.error = error;
    run.completed_at = Some(completed_at);
    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, StoreError> {
    self
      .runs
      .read()
      .unwrap()
      .iter()
      .find(|r| r.run_id == run_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("run '{run_id}'")))
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunRecord>, StoreError> {
    let mut runs: Vec<RunRecord> = self
      .runs
      .read()
      .unwrap()
      .iter()
      .filter(|r| r.workflow_id == workflow_id)
      .cloned()
      .collect();
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(runs)
  }
}

/// Decrypted secrets held in memory, keyed by `(owner_id, credential_id)`.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
  credentials: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(
    &self,
    owner_id: impl Into<String>,
    credential_id: impl Into<String>,
    value: impl Into<String>,
  ) {
    self
      .credentials
      .write()
      .unwrap()
      .insert((owner_id.into(), credential_id.into()), value.into());
  }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
  async fn get_credential(
    &self,
    credential_id: &str,
    owner_id: &str,
  ) -> Result<Option<Credential>, ExecutorError> {
    let credentials = self.credentials.read().unwrap();
    Ok(
      credentials
        .get(&(owner_id.to_string(), credential_id.to_string()))
        .map(|value| Credential {
          id: credential_id.to_string(),
          value: value.clone(),
        }),
    )
  }
}

/// In-process durable step log.
///
/// Records successful step results keyed by `(run_id, node_id, step_name)`
/// and replays them without polling the step body again. Failed steps are
/// not recorded and run again on the next attempt.
#[derive(Clone, Default)]
pub struct MemoryStepLog {
  results: Arc<RwLock<HashMap<(String, String, String), serde_json::Value>>>,
}

impl MemoryStepLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of recorded step results; useful when asserting replay.
  pub fn recorded(&self) -> usize {
    self.results.read().unwrap().len()
  }
}

#[async_trait]
impl StepRunner for MemoryStepLog {
  async fn run_step(
    &self,
    run_id: &str,
    node_id: &str,
    step_name: &str,
    work: StepFuture<'_>,
  ) -> Result<serde_json::Value, ExecutorError> {
    let key = (
      run_id.to_string(),
      node_id.to_string(),
      step_name.to_string(),
    );

    // Replay: return the recorded result without polling `work`.
    {
      let results = self.results.read().unwrap();
      if let Some(recorded) = results.get(&key) {
        return Ok(recorded.clone());
      }
    }

    let value = work.await?;

    self
      .results
      .write()
      .unwrap()
      .insert(key, value.clone());

    Ok(value)
  }
}
