//! DAG Module - flows, tasks and edges
//!
//! Contains the dependency-graph model:
//! - `flow`: Flow container, acyclicity guard, topological order
//! - `task`: Task handles and their builder
//! - `edge`: Edge / pipe values
//! - `context`: thread-local stack of open flow scopes
//! - `names`: per-flow name disambiguation
//! - `id`: prefixed UUID identifiers
//!
//! Invariant: a flow's graph is acyclic at all times. Every edge insertion
//! is checked before it is applied.

pub mod context;
mod edge;
mod flow;
mod graph;
mod id;
mod names;
mod task;

// Re-export public types
pub use context::FlowScope;
pub use edge::Edge;
pub use flow::{Flow, FlowBuilder};
pub use id::{FlowId, TaskId};
pub use task::{Task, TaskBuilder, DEFAULT_LABEL};
