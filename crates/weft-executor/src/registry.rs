use std::collections::HashMap;
use std::sync::Arc;

use weft_workflow::NodeType;

use crate::executor::NodeExecutor;

/// The closed `NodeType -> handler` mapping.
///
/// Populated once at startup from an explicit table and handed to the
/// engine by value - there is no global mutable registry, so tests can
/// substitute fakes per node type.
#[derive(Default)]
pub struct ExecutorRegistry {
  executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register the handler for a node type, replacing any previous one.
  pub fn register(&mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) {
    self.executors.insert(node_type, executor);
  }

  /// Resolve the handler for a node type. `None` means the type is not
  /// covered; the engine treats that as a configuration error, never a
  /// silent skip.
  pub fn resolve(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
    self.executors.get(&node_type).cloned()
  }

  pub fn len(&self) -> usize {
    self.executors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.executors.is_empty()
  }
}
