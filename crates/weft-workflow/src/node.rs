use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of node types the graph editor can persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
  /// Placeholder node the editor creates before a trigger is chosen.
  /// Behaves as a manual trigger during execution.
  Initial,
  ManualTrigger,
  GoogleFormTrigger,
  StripeTrigger,
  HttpRequest,
  Openai,
  Anthropic,
  Gemini,
  Deepseek,
  Grok,
  Discord,
  Slack,
  Display,
}

impl NodeType {
  pub fn as_str(&self) -> &'static str {
    match self {
      NodeType::Initial => "initial",
      NodeType::ManualTrigger => "manual-trigger",
      NodeType::GoogleFormTrigger => "google-form-trigger",
      NodeType::StripeTrigger => "stripe-trigger",
      NodeType::HttpRequest => "http-request",
      NodeType::Openai => "openai",
      NodeType::Anthropic => "anthropic",
      NodeType::Gemini => "gemini",
      NodeType::Deepseek => "deepseek",
      NodeType::Grok => "grok",
      NodeType::Discord => "discord",
      NodeType::Slack => "slack",
      NodeType::Display => "display",
    }
  }

  /// Trigger nodes are pure passthroughs that start a run.
  pub fn is_trigger(&self) -> bool {
    matches!(
      self,
      NodeType::Initial
        | NodeType::ManualTrigger
        | NodeType::GoogleFormTrigger
        | NodeType::StripeTrigger
    )
  }
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single configured step in a workflow graph.
///
/// `data` is the type-dependent configuration bag (prompts, endpoints,
/// variable names, credential references). Each executor deserializes it
/// into its own config struct at entry; the engine never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(rename = "type")]
  pub node_type: NodeType,
  #[serde(default)]
  pub data: serde_json::Value,
}

/// A directed ordering edge: the output of `from_node_id` is available
/// before `to_node_id` runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub from_node_id: String,
  pub to_node_id: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn node_type_round_trips_through_kebab_case() {
    let json = serde_json::to_string(&NodeType::GoogleFormTrigger).unwrap();
    assert_eq!(json, "\"google-form-trigger\"");

    let parsed: NodeType = serde_json::from_str("\"http-request\"").unwrap();
    assert_eq!(parsed, NodeType::HttpRequest);
  }

  #[test]
  fn node_deserializes_with_missing_data() {
    let node: Node =
      serde_json::from_str(r#"{"id": "n1", "type": "manual-trigger"}"#).unwrap();
    assert_eq!(node.node_type, NodeType::ManualTrigger);
    assert!(node.data.is_null());
  }

  #[test]
  fn trigger_classification() {
    assert!(NodeType::Initial.is_trigger());
    assert!(NodeType::StripeTrigger.is_trigger());
    assert!(!NodeType::HttpRequest.is_trigger());
    assert!(!NodeType::Display.is_trigger());
  }
}
