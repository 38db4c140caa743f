//! Weft Workflow
//!
//! This crate provides the persisted workflow graph model for weft:
//! nodes, directed connections, and the execution-plan computation.
//!
//! A workflow is a directed acyclic graph. Connections carry no payload -
//! data flows through the shared execution context during a run; edges only
//! express ordering constraints. The [`Workflow::plan`] method turns the
//! graph into a single deterministic linear order, rejecting cycles before
//! anything executes.

mod error;
mod graph;
mod node;
mod workflow;

pub use error::WorkflowError;
pub use graph::order;
pub use node::{Connection, Node, NodeType};
pub use workflow::Workflow;
