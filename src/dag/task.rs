//! Task - a named vertex owned by exactly one flow
//!
//! A `Task` is a cheap handle (`Arc`). Identity is the [`TaskId`] assigned at
//! construction; the name is assigned by the owning flow at registration.
//! Tasks built inside an open flow scope register themselves; detached tasks
//! are bound later by `Flow::add_task` or `Flow::add_edge`. The binding is
//! set once and never reassigned.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{FlowError, Result};

use super::context;
use super::edge::Edge;
use super::flow::{Flow, FlowInner};
use super::id::TaskId;

/// Base label for tasks created without a name
pub const DEFAULT_LABEL: &str = "Task";

/// Owning flow + the name it assigned
#[derive(Clone)]
pub(crate) struct Binding {
    pub flow: Weak<FlowInner>,
    pub name: Arc<str>,
}

pub(crate) type BindingSlot<'a> = MutexGuard<'a, Option<Binding>>;

struct TaskInner {
    id: TaskId,
    label: Arc<str>,
    explicit: bool,
    binding: Mutex<Option<Binding>>,
}

/// Vertex of a flow's dependency graph
///
/// Compares and hashes by id.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Create an unnamed task in the current flow scope
    ///
    /// Fails with `NoActiveFlow` outside a scope.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a task with an explicit name in the current flow scope
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::builder().name(name).build()
    }

    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }

    /// Create a task that belongs to no flow yet
    ///
    /// Its name becomes `{label}_{n}` once a flow adopts it.
    pub fn detached(label: impl Into<String>) -> Self {
        Self::unbound(TaskId::new(), Arc::from(label.into()), false)
    }

    pub(crate) fn unbound(id: TaskId, label: Arc<str>, explicit: bool) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id,
                label,
                explicit,
                binding: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Base name used for disambiguation
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the label was given explicitly (kept verbatim when free)
    pub fn has_explicit_name(&self) -> bool {
        self.inner.explicit
    }

    /// Name assigned by the owning flow, `None` while detached
    pub fn name(&self) -> Option<Arc<str>> {
        self.inner
            .binding
            .lock()
            .as_ref()
            .map(|binding| Arc::clone(&binding.name))
    }

    /// Owning flow, `None` while detached or once the flow is dropped
    pub fn flow(&self) -> Option<Flow> {
        self.inner
            .binding
            .lock()
            .as_ref()
            .and_then(|binding| binding.flow.upgrade())
            .map(Flow::from_inner)
    }

    pub fn is_detached(&self) -> bool {
        self.inner.binding.lock().is_none()
    }

    pub(crate) fn slot(&self) -> BindingSlot<'_> {
        self.inner.binding.lock()
    }

    // ─────────────────────────────────────────────────────────────
    // Dependency sugar
    // ─────────────────────────────────────────────────────────────

    /// Declare `self → other` and return `other` for chaining
    ///
    /// ```rust,ignore
    /// extract.then(&transform)?.then(&load)?;
    /// ```
    pub fn then(&self, other: &Task) -> Result<Task> {
        self.run_before(other)?;
        Ok(other.clone())
    }

    /// Declare `self → other`
    pub fn run_before(&self, other: &Task) -> Result<()> {
        self.owning_flow(other)?.add_edge(Edge::new(self, other))
    }

    /// Declare `other → self`
    pub fn run_after(&self, other: &Task) -> Result<()> {
        self.owning_flow(other)?.add_edge(Edge::new(other, self))
    }

    /// Declare `self → other`, exposing this task's result to `other` as `key`
    pub fn pipe_to(&self, other: &Task, key: impl Into<Arc<str>>) -> Result<()> {
        self.owning_flow(other)?
            .add_edge(Edge::pipe(self, other, key))
    }

    /// Flow that should receive an edge between `self` and `other`
    ///
    /// Prefers `self`'s flow, then `other`'s, then the ambient scope.
    fn owning_flow(&self, other: &Task) -> Result<Flow> {
        if let Some(flow) = self.bound_flow()? {
            return Ok(flow);
        }
        if let Some(flow) = other.bound_flow()? {
            return Ok(flow);
        }
        context::current().ok_or_else(|| FlowError::NoActiveFlow {
            operation: "connecting two detached tasks".into(),
        })
    }

    fn bound_flow(&self) -> Result<Option<Flow>> {
        let slot = self.slot();
        match slot.as_ref() {
            None => Ok(None),
            Some(binding) => binding
                .flow
                .upgrade()
                .map(|inner| Some(Flow::from_inner(inner)))
                .ok_or_else(|| FlowError::OrphanedTask {
                    task: binding.name.to_string(),
                }),
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(&name),
            None => write!(f, "{} (detached)", self.inner.label),
        }
    }
}

/// Builder for [`Task`]
///
/// Without `.flow(..)` the task joins the flow of the innermost open scope.
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    label: Option<String>,
    flow: Option<Flow>,
    detached: bool,
}

impl TaskBuilder {
    /// Explicit name, kept verbatim unless already taken
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Base label for a generated `{label}_{n}` name
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn flow(mut self, flow: &Flow) -> Self {
        self.flow = Some(flow.clone());
        self
    }

    /// Skip registration entirely
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn build(self) -> Result<Task> {
        let explicit = self.name.as_ref().is_some_and(|name| !name.trim().is_empty());
        let label: Arc<str> = match self.name.or(self.label) {
            Some(label) if !label.trim().is_empty() => Arc::from(label),
            _ => Arc::from(DEFAULT_LABEL),
        };
        let task = Task::unbound(TaskId::new(), label, explicit);

        if self.detached {
            return Ok(task);
        }

        let flow = match self.flow {
            Some(flow) => flow,
            None => context::current().ok_or_else(|| FlowError::NoActiveFlow {
                operation: format!("creating task '{}'", task.label()),
            })?,
        };
        flow.add_task(&task)?;
        Ok(task)
    }
}
