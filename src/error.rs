// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Taskflow Error Types with Error Codes
//!
//! Error code ranges:
//! - FLOW-000-009: Configuration errors (identity, ambient scope, schedules)
//! - FLOW-010-019: Type mismatch errors
//! - FLOW-020-029: Ownership errors (task/edge used with the wrong flow)
//! - FLOW-030-039: DAG errors
//! - FLOW-040-049: Lookup errors
//! - FLOW-050-059: Serialization errors
//! - FLOW-060-069: IO errors

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse classification of every [`FlowError`].
///
/// Callers that only care about the category (e.g. "was this a cycle?")
/// match on the kind instead of the individual variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    TypeMismatch,
    Ownership,
    Cycle,
    Lookup,
    Serialization,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::TypeMismatch => "type mismatch",
            Self::Ownership => "ownership",
            Self::Cycle => "cycle",
            Self::Lookup => "lookup",
            Self::Serialization => "serialization",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
#[diagnostic(url(docsrs))]
pub enum FlowError {
    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[FLOW-001] Flow name is required")]
    #[diagnostic(
        code(taskflow::missing_flow_name),
        help("Pass a non-empty name to Flow::new or FlowBuilder::name")
    )]
    MissingFlowName,

    #[error("[FLOW-002] No active flow for {operation}: open a flow scope or pass a flow explicitly")]
    #[diagnostic(
        code(taskflow::no_active_flow),
        help("Wrap construction in `let _scope = flow.enter();`")
    )]
    NoActiveFlow { operation: String },

    #[error("[FLOW-003] Invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    #[error("[FLOW-004] Config error: {reason}")]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // TYPE MISMATCH ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[FLOW-010] Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    // ═══════════════════════════════════════════
    // OWNERSHIP ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[FLOW-020] Task '{task}' belongs to another flow, not '{flow}'")]
    ForeignTask { task: String, flow: String },

    #[error("[FLOW-021] Task '{task}' is already registered in flow '{flow}'")]
    DuplicateTask { task: String, flow: String },

    #[error("[FLOW-022] Task '{task}' outlived the flow that owned it")]
    OrphanedTask { task: String },

    #[error("[FLOW-023] Edge {edge} already exists in flow '{flow}'")]
    DuplicateEdge { edge: String, flow: String },

    // ═══════════════════════════════════════════
    // DAG ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[FLOW-030] Cycle detected in DAG: {cycle}")]
    #[diagnostic(
        code(taskflow::cycle_detected),
        help("Remove the edge that closes the cycle")
    )]
    CycleDetected { cycle: String },

    // ═══════════════════════════════════════════
    // LOOKUP ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[FLOW-040] Task '{name}' not found in flow '{flow}'")]
    TaskNotFound { name: String, flow: String },

    #[error("[FLOW-041] Flow '{id}' not found in store")]
    FlowNotFound { id: String },

    // ═══════════════════════════════════════════
    // SERIALIZATION ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[FLOW-050] Unknown schedule type '{tag}'")]
    #[diagnostic(
        code(taskflow::unknown_schedule_type),
        help("Supported schedule types: interval, dates")
    )]
    UnknownScheduleType { tag: String },

    #[error("[FLOW-051] Invalid flow document: {reason}")]
    InvalidDocument { reason: String },

    #[error("[FLOW-052] JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("[FLOW-053] YAML parse error: {0}")]
    #[diagnostic(
        code(taskflow::yaml_parse),
        help("Check YAML syntax: indentation must be consistent, strings with special chars need quoting")
    )]
    YamlParse(#[from] serde_yaml::Error),

    // ═══════════════════════════════════════════
    // IO ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[FLOW-060] IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FlowError {
    /// Get the error code (e.g., "FLOW-030")
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFlowName => "FLOW-001",
            Self::NoActiveFlow { .. } => "FLOW-002",
            Self::InvalidSchedule { .. } => "FLOW-003",
            Self::ConfigError { .. } => "FLOW-004",
            Self::TypeMismatch { .. } => "FLOW-010",
            Self::ForeignTask { .. } => "FLOW-020",
            Self::DuplicateTask { .. } => "FLOW-021",
            Self::OrphanedTask { .. } => "FLOW-022",
            Self::DuplicateEdge { .. } => "FLOW-023",
            Self::CycleDetected { .. } => "FLOW-030",
            Self::TaskNotFound { .. } => "FLOW-040",
            Self::FlowNotFound { .. } => "FLOW-041",
            Self::UnknownScheduleType { .. } => "FLOW-050",
            Self::InvalidDocument { .. } => "FLOW-051",
            Self::JsonError(_) => "FLOW-052",
            Self::YamlParse(_) => "FLOW-053",
            Self::IoError(_) => "FLOW-060",
        }
    }

    /// Category of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFlowName
            | Self::NoActiveFlow { .. }
            | Self::InvalidSchedule { .. }
            | Self::ConfigError { .. } => ErrorKind::Configuration,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::ForeignTask { .. }
            | Self::DuplicateTask { .. }
            | Self::OrphanedTask { .. }
            | Self::DuplicateEdge { .. } => ErrorKind::Ownership,
            Self::CycleDetected { .. } => ErrorKind::Cycle,
            Self::TaskNotFound { .. } | Self::FlowNotFound { .. } => ErrorKind::Lookup,
            Self::UnknownScheduleType { .. }
            | Self::InvalidDocument { .. }
            | Self::JsonError(_)
            | Self::YamlParse(_) => ErrorKind::Serialization,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// Check if error is recoverable (can be retried)
    ///
    /// Graph errors are caller mistakes or invalid input; only IO is transient.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IoError(_))
    }

    pub(crate) fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::MissingFlowName => Some("Give the flow a non-empty name"),
            FlowError::NoActiveFlow { .. } => {
                Some("Open a scope with flow.enter() or pass the flow to the task builder")
            }
            FlowError::InvalidSchedule { .. } => Some("Use a non-zero interval"),
            FlowError::ConfigError { .. } => {
                Some("Check ~/.config/taskflow/config.toml for TOML syntax errors")
            }
            FlowError::TypeMismatch { .. } => Some("Pass a value of the expected kind"),
            FlowError::ForeignTask { .. } => {
                Some("Create the task inside the flow you want to wire it into")
            }
            FlowError::DuplicateTask { .. } => {
                Some("Tasks register themselves on construction; do not add them twice")
            }
            FlowError::OrphanedTask { .. } => Some("Keep the owning flow alive while using its tasks"),
            FlowError::DuplicateEdge { .. } => Some("Remove the repeated dependency"),
            FlowError::CycleDetected { .. } => {
                Some("Remove circular dependencies from your flow")
            }
            FlowError::TaskNotFound { .. } => Some("Check the task name (names carry a _N suffix)"),
            FlowError::FlowNotFound { .. } => Some("Save the flow before loading it by id"),
            FlowError::UnknownScheduleType { .. } => {
                Some("Use one of the supported schedule types: interval, dates")
            }
            FlowError::InvalidDocument { .. } => {
                Some("Regenerate the document with Flow::serialize")
            }
            FlowError::JsonError(_) => Some("Check JSON syntax"),
            FlowError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            FlowError::IoError(_) => Some("Check file permissions and that the path exists"),
        }
    }
}
