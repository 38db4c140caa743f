use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use weft_engine::{Engine, EngineError, RetryPolicy};
use weft_executor::{
  ChannelPublisher, ExecutorError, ExecutorRegistry, ExecutorServices, NodeExecution,
  NodeExecutor, NodeStatus, NoopPublisher, WorkflowContext,
};
use weft_store::{
  MemoryCredentialStore, MemoryGraphStore, MemoryRunStore, MemoryStepLog, RunStatus, RunStore,
};
use weft_workflow::{Connection, Node, NodeType, Workflow, WorkflowError};

/// Appends every node it executes to a shared list and writes its node id
/// into the context.
#[derive(Clone, Default)]
struct RecordingExecutor {
  seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
  fn seen(&self) -> Vec<String> {
    self.seen.lock().unwrap().clone()
  }
}

#[async_trait]
impl NodeExecutor for RecordingExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    _services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    self.seen.lock().unwrap().push(exec.node_id.to_string());
    let mut context = exec.context;
    context.insert(exec.node_id.to_string(), json!(true));
    Ok(context)
  }
}

/// Fails transiently a fixed number of times, then succeeds.
#[derive(Clone)]
struct FlakyExecutor {
  remaining_failures: Arc<Mutex<u32>>,
  attempts: Arc<Mutex<u32>>,
}

impl FlakyExecutor {
  fn failing(times: u32) -> Self {
    Self {
      remaining_failures: Arc::new(Mutex::new(times)),
      attempts: Arc::new(Mutex::new(0)),
    }
  }
}

#[async_trait]
impl NodeExecutor for FlakyExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    _services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    *self.attempts.lock().unwrap() += 1;
    let mut remaining = self.remaining_failures.lock().unwrap();
    if *remaining > 0 {
      *remaining -= 1;
      return Err(ExecutorError::transient(exec.node_id, "rate limited"));
    }
    Ok(exec.context)
  }
}

/// Performs its side effect inside a durable step so replays can be
/// observed.
#[derive(Clone, Default)]
struct SteppedExecutor {
  side_effects: Arc<Mutex<u32>>,
}

#[async_trait]
impl NodeExecutor for SteppedExecutor {
  async fn execute(
    &self,
    exec: NodeExecution<'_>,
    services: &ExecutorServices<'_>,
  ) -> Result<WorkflowContext, ExecutorError> {
    let side_effects = self.side_effects.clone();
    let value = services
      .step
      .run(
        "side-effect",
        Box::pin(async move {
          *side_effects.lock().unwrap() += 1;
          Ok(json!({"done": true}))
        }),
      )
      .await?;
    let mut context = exec.context;
    context.insert(exec.node_id.to_string(), value);
    Ok(context)
  }
}

struct Fixture {
  graphs: MemoryGraphStore,
  runs: MemoryRunStore,
  credentials: MemoryCredentialStore,
  steps: MemoryStepLog,
}

impl Fixture {
  fn new() -> Self {
    Self {
      graphs: MemoryGraphStore::new(),
      runs: MemoryRunStore::new(),
      credentials: MemoryCredentialStore::new(),
      steps: MemoryStepLog::new(),
    }
  }

  fn engine(&self, registry: ExecutorRegistry) -> Engine {
    Engine::new(
      Arc::new(self.graphs.clone()),
      Arc::new(self.runs.clone()),
      Arc::new(self.credentials.clone()),
      Arc::new(self.steps.clone()),
      Arc::new(NoopPublisher),
      registry,
    )
  }
}

fn node(id: &str, node_type: NodeType) -> Node {
  Node {
    id: id.to_string(),
    node_type,
    data: Value::Null,
  }
}

fn data_node(id: &str, node_type: NodeType, data: Value) -> Node {
  Node {
    id: id.to_string(),
    node_type,
    data,
  }
}

fn conn(from: &str, to: &str) -> Connection {
  Connection {
    from_node_id: from.to_string(),
    to_node_id: to.to_string(),
  }
}

fn workflow(nodes: Vec<Node>, connections: Vec<Connection>) -> Workflow {
  Workflow {
    workflow_id: "wf-1".to_string(),
    name: "Test workflow".to_string(),
    owner_id: "owner-1".to_string(),
    nodes,
    connections,
  }
}

#[tokio::test]
async fn executes_nodes_in_topological_order() {
  let fixture = Fixture::new();
  // Stored out of execution order on purpose; b is stored before c, so
  // the tie between them breaks toward b.
  fixture.graphs.insert(workflow(
    vec![
      node("d", NodeType::Display),
      node("b", NodeType::Display),
      node("c", NodeType::Display),
      node("a", NodeType::ManualTrigger),
    ],
    vec![conn("a", "b"), conn("a", "c"), conn("b", "d"), conn("c", "d")],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));
  registry.register(NodeType::Display, Arc::new(recording.clone()));

  let engine = fixture.engine(registry);
  engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(recording.seen(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn cycle_fails_the_run_before_any_node_executes() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::ManualTrigger), node("b", NodeType::Display)],
    vec![conn("a", "b"), conn("b", "a")],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));
  registry.register(NodeType::Display, Arc::new(recording.clone()));

  let engine = fixture.engine(registry);
  let err = engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    EngineError::Workflow(WorkflowError::CycleDetected)
  ));
  assert!(recording.seen().is_empty());

  let runs = fixture.runs.list_runs("wf-1").await.unwrap();
  assert_eq!(runs.len(), 1);
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert!(runs[0].error.is_some());
}

#[tokio::test]
async fn context_accumulates_across_nodes() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::ManualTrigger), node("b", NodeType::Display)],
    vec![conn("a", "b")],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));
  registry.register(NodeType::Display, Arc::new(recording.clone()));

  let engine = fixture.engine(registry);
  let mut initial = WorkflowContext::new();
  initial.insert("trigger".to_string(), json!({"body": 1}));

  let outcome = engine
    .run("wf-1", initial, CancellationToken::new())
    .await
    .unwrap();

  // Initial keys survive and each node added its own.
  assert_eq!(outcome.context.get("trigger"), Some(&json!({"body": 1})));
  assert_eq!(outcome.context.get("a"), Some(&json!(true)));
  assert_eq!(outcome.context.get("b"), Some(&json!(true)));

  let run = fixture.runs.get_run(&outcome.run_id).await.unwrap();
  assert_eq!(run.status, RunStatus::Succeeded);
  assert_eq!(run.result.unwrap().0, Value::Object(outcome.context));
}

#[tokio::test]
async fn failure_stops_the_run_at_the_failing_node() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![
      node("a", NodeType::ManualTrigger),
      node("b", NodeType::HttpRequest),
      node("c", NodeType::Display),
    ],
    vec![conn("a", "b"), conn("b", "c")],
  ));

  struct AlwaysFails;
  #[async_trait]
  impl NodeExecutor for AlwaysFails {
    async fn execute(
      &self,
      exec: NodeExecution<'_>,
      _services: &ExecutorServices<'_>,
    ) -> Result<WorkflowContext, ExecutorError> {
      Err(ExecutorError::configuration(exec.node_id, "no endpoint configured"))
    }
  }

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));
  registry.register(NodeType::HttpRequest, Arc::new(AlwaysFails));
  registry.register(NodeType::Display, Arc::new(recording.clone()));

  let engine = fixture.engine(registry);
  let err = engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::Node(ExecutorError::Configuration { .. })));
  // Node c never ran: no partial success beyond the failing node.
  assert_eq!(recording.seen(), vec!["a"]);

  let runs = fixture.runs.list_runs("wf-1").await.unwrap();
  assert_eq!(runs[0].status, RunStatus::Failed);
  assert!(runs[0].result.is_none());
}

#[tokio::test]
async fn unknown_node_type_is_a_terminal_error() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::ManualTrigger), node("b", NodeType::Slack)],
    vec![conn("a", "b")],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));

  let engine = fixture
    .engine(registry)
    .with_retry_policy(RetryPolicy { max_attempts: 3 });
  let err = engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::UnknownNodeType { .. }));
  // Not retriable: the plan ran exactly once.
  assert_eq!(recording.seen(), vec!["a"]);
}

#[tokio::test]
async fn retry_replays_transient_failures_without_repeating_steps() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![
      node("a", NodeType::ManualTrigger),
      node("b", NodeType::HttpRequest),
    ],
    vec![conn("a", "b")],
  ));

  let stepped = SteppedExecutor::default();
  let flaky = FlakyExecutor::failing(1);
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(stepped.clone()));
  registry.register(NodeType::HttpRequest, Arc::new(flaky.clone()));

  let engine = fixture
    .engine(registry)
    .with_retry_policy(RetryPolicy { max_attempts: 2 });
  engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap();

  // Node a ran twice but its durable step only performed the side effect
  // on the first attempt.
  assert_eq!(*stepped.side_effects.lock().unwrap(), 1);
  assert_eq!(*flaky.attempts.lock().unwrap(), 2);
}

#[tokio::test]
async fn default_policy_does_not_retry() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::HttpRequest)],
    vec![],
  ));

  let flaky = FlakyExecutor::failing(1);
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::HttpRequest, Arc::new(flaky.clone()));

  let engine = fixture.engine(registry);
  let err = engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(err.is_retriable());
  assert_eq!(*flaky.attempts.lock().unwrap(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_the_run() {
  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::ManualTrigger)],
    vec![],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));

  let cancel = CancellationToken::new();
  cancel.cancel();

  let engine = fixture.engine(registry);
  let err = engine
    .run("wf-1", WorkflowContext::new(), cancel)
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::Cancelled));
  assert!(recording.seen().is_empty());
}

#[tokio::test]
async fn missing_workflow_creates_no_run_record() {
  let fixture = Fixture::new();
  let engine = fixture.engine(ExecutorRegistry::new());

  let err = engine
    .run("ghost", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::WorkflowNotFound(_)));
  assert!(fixture.runs.list_runs("ghost").await.unwrap().is_empty());
}

#[tokio::test]
async fn runner_processes_queued_requests() {
  use std::time::Duration;
  use weft_engine::{RunRequest, WorkflowRunner};

  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![node("a", NodeType::ManualTrigger)],
    vec![],
  ));

  let recording = RecordingExecutor::default();
  let mut registry = ExecutorRegistry::new();
  registry.register(NodeType::ManualTrigger, Arc::new(recording.clone()));

  let runner = WorkflowRunner::new(Arc::new(fixture.engine(registry)), 8);
  let sender = runner.sender();
  let cancel = CancellationToken::new();
  let handle = tokio::spawn(runner.start(cancel.clone()));

  sender
    .send(RunRequest {
      workflow_id: "wf-1".to_string(),
      initial_context: WorkflowContext::new(),
    })
    .await
    .unwrap();
  // A run for a missing workflow is logged, not fatal to the loop.
  sender
    .send(RunRequest {
      workflow_id: "ghost".to_string(),
      initial_context: WorkflowContext::new(),
    })
    .await
    .unwrap();
  drop(sender);

  tokio::time::timeout(Duration::from_secs(5), handle)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(recording.seen(), vec!["a"]);
  assert_eq!(fixture.runs.list_runs("wf-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn runs_a_trigger_http_display_workflow_end_to_end() {
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/data"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({"y": 1})))
    .expect(1)
    .mount(&server)
    .await;

  let fixture = Fixture::new();
  fixture.graphs.insert(workflow(
    vec![
      node("t", NodeType::ManualTrigger),
      data_node(
        "h",
        NodeType::HttpRequest,
        json!({
          "endpoint": format!("{}/data", server.uri()),
          "method": "GET",
          "variable_name": "a",
        }),
      ),
      data_node("d", NodeType::Display, json!({"variable_name": "a"})),
    ],
    vec![conn("t", "h"), conn("h", "d")],
  ));

  let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
  let engine = Engine::new(
    Arc::new(fixture.graphs.clone()),
    Arc::new(fixture.runs.clone()),
    Arc::new(fixture.credentials.clone()),
    Arc::new(fixture.steps.clone()),
    Arc::new(ChannelPublisher::new(tx)),
    weft_nodes::default_registry(reqwest::Client::new()),
  );

  let outcome = engine
    .run("wf-1", WorkflowContext::new(), CancellationToken::new())
    .await
    .unwrap();

  let expected = json!({
    "httpResponse": {"status": 200, "statusText": "OK", "data": {"y": 1}}
  });
  assert_eq!(outcome.context.get("a"), Some(&expected));

  let run = fixture.runs.get_run(&outcome.run_id).await.unwrap();
  assert_eq!(run.status, RunStatus::Succeeded);

  // loading/success per node, in execution order.
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  let summary: Vec<(String, NodeStatus)> = events
    .iter()
    .map(|e| (e.node_id.clone(), e.status))
    .collect();
  assert_eq!(
    summary,
    vec![
      ("t".to_string(), NodeStatus::Loading),
      ("t".to_string(), NodeStatus::Success),
      ("h".to_string(), NodeStatus::Loading),
      ("h".to_string(), NodeStatus::Success),
      ("d".to_string(), NodeStatus::Loading),
      ("d".to_string(), NodeStatus::Success),
    ]
  );
  // The display node carried the surfaced value on its success event.
  assert_eq!(events[5].payload, Some(expected));
}
