//! Weft Engine
//!
//! The sequential orchestration core. [`Engine::run`] drives one workflow
//! run end to end:
//!
//! 1. load the graph from the [`GraphStore`](weft_store::GraphStore),
//! 2. validate it and compute the execution order (an invalid graph fails
//!    the run before any node executes),
//! 3. dispatch each node to its registered executor, threading the
//!    accumulated context through,
//! 4. stop at the first failure - there is no partial success,
//! 5. record the terminal state for the execution-history view.
//!
//! [`WorkflowRunner`] wraps an engine in a channel-fed loop for callers
//! that submit runs asynchronously.

mod engine;
mod error;
mod runner;

pub use engine::{Engine, RetryPolicy, RunOutcome};
pub use error::EngineError;
pub use runner::{RunRequest, WorkflowRunner};
