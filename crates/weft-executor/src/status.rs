//! Node lifecycle status events for UI observability.
//!
//! Status events are ephemeral and purely observational: the engine never
//! consumes them, and a failed publish must never abort node execution.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Per-node lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
  Loading,
  Success,
  Error,
}

/// An ephemeral lifecycle notification for one node-phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
  pub node_id: String,
  pub status: NodeStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
}

impl StatusEvent {
  pub fn loading(node_id: impl Into<String>) -> Self {
    Self::new(node_id, NodeStatus::Loading)
  }

  pub fn success(node_id: impl Into<String>) -> Self {
    Self::new(node_id, NodeStatus::Success)
  }

  pub fn error(node_id: impl Into<String>) -> Self {
    Self::new(node_id, NodeStatus::Error)
  }

  fn new(node_id: impl Into<String>, status: NodeStatus) -> Self {
    Self {
      node_id: node_id.into(),
      status,
      payload: None,
    }
  }

  pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
    self.payload = Some(payload);
    self
  }
}

/// Trait for shipping status events to an observer (a browser tab, a log,
/// a test probe). Fire-and-forget: implementations decide what to do with
/// events and must swallow their own delivery failures.
pub trait StatusPublisher: Send + Sync {
  fn publish(&self, event: StatusEvent);
}

/// A publisher that discards all events. Useful for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct NoopPublisher;

impl StatusPublisher for NoopPublisher {
  fn publish(&self, _event: StatusEvent) {
    // Intentionally empty
  }
}

/// A publisher that sends events to an unbounded channel.
///
/// Use this to consume events asynchronously (persist, stream to a UI over
/// websocket, etc.).
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
  // NOTE: Unbounded so a slow consumer never blocks the engine. Event
  // volume is low (a handful per node), so memory growth is unlikely in
  // practice.
  sender: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelPublisher {
  pub fn new(sender: mpsc::UnboundedSender<StatusEvent>) -> Self {
    Self { sender }
  }
}

impl StatusPublisher for ChannelPublisher {
  fn publish(&self, event: StatusEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channel_publisher_delivers_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let publisher = ChannelPublisher::new(tx);

    publisher.publish(StatusEvent::loading("n1"));
    publisher.publish(StatusEvent::success("n1").with_payload(serde_json::json!({"ok": true})));

    let first = rx.try_recv().unwrap();
    assert_eq!(first.node_id, "n1");
    assert_eq!(first.status, NodeStatus::Loading);

    let second = rx.try_recv().unwrap();
    assert_eq!(second.status, NodeStatus::Success);
    assert!(second.payload.is_some());
  }

  #[test]
  fn publish_after_receiver_drop_does_not_panic() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let publisher = ChannelPublisher::new(tx);
    publisher.publish(StatusEvent::error("n1"));
  }
}
