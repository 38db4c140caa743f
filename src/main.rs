use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use weft_engine::{Engine, RetryPolicy};
use weft_executor::{ChannelPublisher, StepRunner, WorkflowContext};
use weft_store::{
  MemoryCredentialStore, MemoryGraphStore, MemoryRunStore, MemoryStepLog, RunStore, SqliteStore,
};
use weft_workflow::Workflow;

/// weft - run automation workflows from the command line
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a workflow from a JSON file
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// JSON file mapping credential ids to secret values
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// SQLite database for run history and the durable step log
    #[arg(long)]
    history: Option<PathBuf>,

    /// Extra attempts after a transient failure
    #[arg(long, default_value_t = 0)]
    retries: u32,
  },

  /// Validate a workflow and print its execution order
  Plan {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run {
      workflow_file,
      credentials,
      history,
      retries,
    } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, credentials, history, retries))
    }
    Commands::Plan { workflow_file } => plan_workflow(&workflow_file),
  }
}

fn load_workflow(path: &Path) -> Result<Workflow> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

fn plan_workflow(path: &Path) -> Result<()> {
  let workflow = load_workflow(path)?;
  let plan = workflow.plan().context("workflow graph is invalid")?;

  for (position, node) in plan.iter().enumerate() {
    println!("{}. {} ({})", position + 1, node.id, node.node_type);
  }
  Ok(())
}

async fn run_workflow(
  workflow_file: PathBuf,
  credentials_file: Option<PathBuf>,
  history: Option<PathBuf>,
  retries: u32,
) -> Result<()> {
  let workflow = load_workflow(&workflow_file)?;
  let workflow_id = workflow.workflow_id.clone();
  let owner_id = workflow.owner_id.clone();
  eprintln!("Loaded workflow: {}", workflow.name);

  let graphs = MemoryGraphStore::new();
  graphs.insert(workflow);

  let credentials = MemoryCredentialStore::new();
  if let Some(file) = credentials_file {
    let content = std::fs::read_to_string(&file)
      .with_context(|| format!("failed to read credentials file: {}", file.display()))?;
    let secrets: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
      .with_context(|| format!("failed to parse credentials file: {}", file.display()))?;
    for (id, value) in secrets {
      let Some(value) = value.as_str() else {
        bail!("credential '{id}' must be a string");
      };
      credentials.insert(owner_id.clone(), id, value);
    }
  }

  let (runs, steps): (Arc<dyn RunStore>, Arc<dyn StepRunner>) = match history {
    Some(db) => {
      let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", db.display()))
        .await
        .with_context(|| format!("failed to open history database: {}", db.display()))?;
      let store = Arc::new(SqliteStore::new(pool));
      store
        .init()
        .await
        .context("failed to prepare history database")?;
      (store.clone(), store)
    }
    None => (
      Arc::new(MemoryRunStore::new()),
      Arc::new(MemoryStepLog::new()),
    ),
  };

  let (events, mut event_rx) =
    tokio::sync::mpsc::unbounded_channel::<weft_executor::StatusEvent>();
  let status_task = tokio::spawn(async move {
    while let Some(event) = event_rx.recv().await {
      info!(node_id = %event.node_id, status = ?event.status, "node_status");
    }
  });

  let engine = Engine::new(
    Arc::new(graphs),
    runs,
    Arc::new(credentials),
    steps,
    Arc::new(ChannelPublisher::new(events)),
    weft_nodes::default_registry(reqwest::Client::new()),
  )
  .with_retry_policy(RetryPolicy {
    max_attempts: retries + 1,
  });

  let initial_context = read_payload_from_stdin()?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        cancel.cancel();
      }
    });
  }

  let outcome = engine
    .run(&workflow_id, initial_context, cancel)
    .await
    .context("workflow execution failed")?;
  status_task.abort();

  eprintln!("Run {} succeeded", outcome.run_id);
  println!("{}", serde_json::to_string_pretty(&outcome.context)?);
  Ok(())
}

fn read_payload_from_stdin() -> Result<WorkflowContext> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe; the run starts from an empty context.
    return Ok(WorkflowContext::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read trigger payload from stdin")?;
  if input.trim().is_empty() {
    return Ok(WorkflowContext::new());
  }

  let payload: serde_json::Value =
    serde_json::from_str(&input).context("failed to parse trigger payload JSON")?;
  match payload {
    serde_json::Value::Object(map) => Ok(map),
    _ => bail!("trigger payload must be a JSON object"),
  }
}
