use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use weft_executor::WorkflowContext;

use crate::engine::Engine;

/// A request to execute one workflow run.
pub struct RunRequest {
  pub workflow_id: String,
  /// Trigger payload; becomes the run's initial context.
  pub initial_context: WorkflowContext,
}

/// Channel-fed run loop around an [`Engine`].
///
/// Producers (an HTTP trigger endpoint, a scheduler, the CLI) push
/// [`RunRequest`]s through the sender; the runner drains them one at a
/// time until the queue closes or the token cancels. Run failures are
/// logged, never propagated - one bad run must not take the loop down.
pub struct WorkflowRunner {
  engine: Arc<Engine>,
  sender: mpsc::Sender<RunRequest>,
  receiver: mpsc::Receiver<RunRequest>,
}

impl WorkflowRunner {
  pub fn new(engine: Arc<Engine>, capacity: usize) -> Self {
    let (sender, receiver) = mpsc::channel(capacity);
    Self {
      engine,
      sender,
      receiver,
    }
  }

  /// A handle for submitting runs; clone freely.
  pub fn sender(&self) -> mpsc::Sender<RunRequest> {
    self.sender.clone()
  }

  /// Drain the queue until cancellation or until every sender is dropped.
  pub async fn start(mut self, cancel: CancellationToken) {
    // Drop our own sender so `recv` returns None once external senders go.
    drop(self.sender);

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("runner_stopping");
          break;
        }
        request = self.receiver.recv() => {
          let Some(request) = request else {
            info!("runner_queue_closed");
            break;
          };
          let result = self
            .engine
            .run(&request.workflow_id, request.initial_context, cancel.child_token())
            .await;
          if let Err(err) = result {
            error!(workflow_id = %request.workflow_id, error = %err, "run_failed");
          }
        }
      }
    }
  }
}
