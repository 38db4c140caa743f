//! Execution-plan computation.
//!
//! Turns a node set plus directed connections into a single linear order
//! via Kahn's algorithm. Every node is registered as a vertex up front, so
//! nodes with no incident edges appear in the plan exactly once without
//! any synthetic self-edges - which also means a genuine self-loop is
//! reported as a cycle rather than silently tolerated.

use std::collections::{HashMap, VecDeque};

use crate::error::WorkflowError;
use crate::node::{Connection, Node};

/// Compute the linear execution order for `nodes` under `connections`.
///
/// Guarantees:
/// - For every connection `(a, b)`, `a` precedes `b` in the result.
/// - With no connections at all, the stored node order is returned as-is.
/// - Ties between independent nodes are broken by stored node order, so an
///   unchanged graph always yields the same plan.
///
/// A cyclic graph has no valid plan and returns
/// [`WorkflowError::CycleDetected`].
pub fn order(nodes: &[Node], connections: &[Connection]) -> Result<Vec<Node>, WorkflowError> {
  // A workflow with no edges runs all its nodes in stored order.
  if connections.is_empty() {
    return Ok(nodes.to_vec());
  }

  let mut indegree: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
  let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(nodes.len());
  for node in nodes {
    indegree.insert(node.id.as_str(), 0);
    adjacency.insert(node.id.as_str(), Vec::new());
  }

  for connection in connections {
    let (from, to) = (
      connection.from_node_id.as_str(),
      connection.to_node_id.as_str(),
    );
    if !adjacency.contains_key(to) {
      return Err(WorkflowError::InvalidConnection {
        from: from.to_string(),
        to: to.to_string(),
      });
    }
    adjacency
      .get_mut(from)
      .ok_or_else(|| WorkflowError::InvalidConnection {
        from: from.to_string(),
        to: to.to_string(),
      })?
      .push(to);
    // `to` was validated against the vertex set above.
    *indegree.entry(to).or_insert(0) += 1;
  }

  // Seed the queue in stored node order for deterministic tie-breaking.
  let mut queue: VecDeque<&str> = nodes
    .iter()
    .map(|n| n.id.as_str())
    .filter(|id| indegree[id] == 0)
    .collect();

  let mut sorted_ids: Vec<&str> = Vec::with_capacity(nodes.len());
  while let Some(id) = queue.pop_front() {
    sorted_ids.push(id);
    for &next in &adjacency[id] {
      // Adjacency only ever holds validated vertices.
      if let Some(remaining) = indegree.get_mut(next) {
        *remaining -= 1;
        if *remaining == 0 {
          queue.push_back(next);
        }
      }
    }
  }

  // Any vertex left unordered sits on a cycle.
  if sorted_ids.len() != nodes.len() {
    return Err(WorkflowError::CycleDetected);
  }

  let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
  Ok(sorted_ids.iter().map(|id| by_id[id].clone()).collect())
}
