use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::graph::order;
use crate::node::{Connection, Node};

/// A persisted workflow graph, ready for planning and execution.
///
/// Node order is significant: it is the execution order for edge-less
/// workflows and the tie-breaker between independent branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  /// Owning user; every credential lookup during a run is scoped to it.
  pub owner_id: String,
  pub nodes: Vec<Node>,
  #[serde(default)]
  pub connections: Vec<Connection>,
}

impl Workflow {
  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Validate the graph shape: unique node ids, connections only between
  /// known nodes.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for node in &self.nodes {
      if !seen.insert(node.id.as_str()) {
        return Err(WorkflowError::DuplicateNodeId {
          node_id: node.id.clone(),
        });
      }
    }

    for connection in &self.connections {
      if !seen.contains(connection.from_node_id.as_str())
        || !seen.contains(connection.to_node_id.as_str())
      {
        return Err(WorkflowError::InvalidConnection {
          from: connection.from_node_id.clone(),
          to: connection.to_node_id.clone(),
        });
      }
    }

    Ok(())
  }

  /// Compute the execution plan: a linear, cycle-free node ordering.
  pub fn plan(&self) -> Result<Vec<Node>, WorkflowError> {
    self.validate()?;
    order(&self.nodes, &self.connections)
  }
}
