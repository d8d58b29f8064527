//! taskflow - dependency-graph core for workflow orchestration
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  dag/       Flow, Task, Edge, ambient construction scope      │
//! │  schedule   Recurrence schedules (interval, explicit dates)   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  document   Flow ⇄ JSON/YAML documents                        │
//! │  store/     Persistence (MemoryStore, FileStore)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`dag`] | Acyclic task graph, name allocation, topological order |
//! | [`schedule`] | `next_n` run instants for a flow |
//! | [`document`] | Serialized flow form and schedule decoding |
//! | [`store`] | Save/load flows by id (DashMap, filesystem) |
//! | [`config`] | Default namespace/version (TOML + env) |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! ## Example
//!
//! ```rust,ignore
//! use taskflow::{Flow, Task};
//!
//! let flow = Flow::new("etl")?;
//! let (extract, load) = flow.scope(|_| -> taskflow::Result<_> {
//!     Ok((Task::named("extract")?, Task::named("load")?))
//! })?;
//! extract.run_before(&load)?;
//! assert_eq!(flow.topological_order()?, vec![extract, load]);
//! ```

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod dag;
pub mod schedule;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Documents, persistence
// ═══════════════════════════════════════════════════════════════
pub mod document;
pub mod store;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Graph types
pub use dag::{Edge, Flow, FlowBuilder, FlowId, FlowScope, Task, TaskBuilder, TaskId};

// Schedules and documents
pub use document::{schedule_from_value, EdgeDocument, FlowDocument, TaskDocument};
pub use schedule::{DateSchedule, IntervalSchedule, Schedule, Upcoming};

// Persistence
pub use store::{FileStore, FlowStore, MemoryStore};

// Error types
pub use error::{ErrorKind, FixSuggestion, FlowError, Result};

// Config types
pub use config::TaskflowConfig;
