//! Weft Template
//!
//! Resolves `{{path}}` and `{{json path}}` placeholders in user-authored
//! configuration fields against the execution context.
//!
//! Template text is attacker-controllable user input, so this is not a
//! general template engine: the only supported forms are a dotted-path
//! lookup and the single `json` helper. There is no expression evaluation,
//! no control flow, and no way to call into the host.
//!
//! - `{{trigger.body.email}}` - dotted-path lookup, coerced to a string.
//! - `{{json response}}` - the value at the path, pretty-printed as JSON.
//! - Missing paths resolve to the empty string; templates degrade
//!   gracefully instead of failing the node.
//! - Text that does not match the placeholder shape is left verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*(json\s+)?([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\s*\}\}")
    .expect("placeholder regex is valid")
});

/// Resolve every placeholder in `template` against `context`.
pub fn resolve(template: &str, context: &serde_json::Map<String, Value>) -> String {
  PLACEHOLDER
    .replace_all(template, |caps: &Captures<'_>| {
      let as_json = caps.get(1).is_some();
      let path = &caps[2];

      match lookup_path(context, path) {
        Some(value) if as_json => {
          serde_json::to_string_pretty(value).unwrap_or_default()
        }
        Some(value) => value_to_string(value),
        None => String::new(),
      }
    })
    .into_owned()
}

/// Walk a dotted path into the context. Array indexing is intentionally
/// unsupported; paths traverse objects only.
fn lookup_path<'a>(context: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
  let mut segments = path.split('.');
  let mut current = context.get(segments.next()?)?;
  for segment in segments {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}

/// Coerce a context value to its interpolated string form.
///
/// Strings substitute without surrounding quotes; composite values fall
/// back to compact JSON so they remain readable inside prompts.
fn value_to_string(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
  }
}
