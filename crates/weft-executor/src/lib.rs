//! Weft Executor
//!
//! The uniform contract every node handler conforms to, and the shared
//! services the engine hands to each node:
//!
//! - [`NodeExecutor`] - the polymorphic handler trait: validate config,
//!   resolve templates, perform the side effect inside a durable step,
//!   publish status, return the extended context.
//! - [`ExecutorRegistry`] - the closed `NodeType -> handler` mapping,
//!   constructed once at startup and injected into the engine.
//! - [`StatusPublisher`] - fire-and-forget per-node lifecycle events for
//!   UI observation.
//! - [`StepRunner`] / [`Step`] - the durable step boundary: a unit of
//!   side-effecting work memoized by `(run_id, node_id, step_name)` so a
//!   replayed run never repeats a completed side effect.
//! - [`CredentialStore`] - decrypted secrets, scoped to the workflow owner.
//! - [`ExecutorError`] - the retriable/non-retriable failure taxonomy.

mod credential;
mod error;
mod executor;
mod registry;
mod status;
mod step;

pub use credential::{Credential, CredentialStore};
pub use error::ExecutorError;
pub use executor::{ExecutorServices, NodeExecution, NodeExecutor};
pub use registry::ExecutorRegistry;
pub use status::{ChannelPublisher, NodeStatus, NoopPublisher, StatusEvent, StatusPublisher};
pub use step::{Step, StepFuture, StepRunner};

/// Accumulating key-value result store threaded through a run.
///
/// Keys are the output-variable names configured on nodes; once written by
/// a node, a key is visible to every node ordered after it. A later node
/// may intentionally shadow an earlier key by reusing its variable name.
pub type WorkflowContext = serde_json::Map<String, serde_json::Value>;
