//! Flow - the container owning a DAG of tasks
//!
//! A `Flow` is a cheap handle (`Arc`) around immutable identity
//! (namespace, name, version, schedule) and a mutex-guarded [`FlowGraph`].
//! Every mutation takes that one lock, so the acyclicity check and the
//! insertion it guards are atomic together.
//!
//! Lock order: flow graph first, then task bindings (lowest id first).

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, error, warn};

use crate::config::{self, TaskflowConfig};
use crate::error::{FlowError, Result};
use crate::schedule::Schedule;

use super::context::{self, FlowScope};
use super::edge::Edge;
use super::graph::FlowGraph;
use super::id::{FlowId, TaskId};
use super::task::{Binding, BindingSlot, Task, TaskBuilder};

pub(crate) struct FlowInner {
    namespace: Arc<str>,
    name: Arc<str>,
    version: Arc<str>,
    schedule: Option<Schedule>,
    id: OnceCell<FlowId>,
    graph: Mutex<FlowGraph>,
}

/// Directed acyclic graph of tasks plus identity and schedule
///
/// Clones share the same underlying flow; equality is identity.
#[derive(Clone)]
pub struct Flow {
    inner: Arc<FlowInner>,
}

/// Whether an edge endpoint is already ours or still needs binding
#[derive(Clone, Copy, PartialEq, Eq)]
enum Membership {
    Member,
    Detached,
}

impl Flow {
    /// Create an empty flow with default namespace and version
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::builder().name(name).build()
    }

    pub fn builder() -> FlowBuilder {
        FlowBuilder::default()
    }

    pub(crate) fn from_inner(inner: Arc<FlowInner>) -> Self {
        Self { inner }
    }

    // ─────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.inner.schedule.as_ref()
    }

    /// Persistent id, `None` until the flow is saved
    pub fn id(&self) -> Option<FlowId> {
        self.inner.id.get().copied()
    }

    /// Set the persistent id once; later calls return the existing id
    pub(crate) fn assign_id(&self, id: FlowId) -> FlowId {
        *self.inner.id.get_or_init(|| id)
    }

    // ─────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────

    /// Register a detached task and assign its name
    ///
    /// Fails if the task already belongs to this or any other flow.
    pub fn add_task(&self, task: &Task) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let mut slot = task.slot();

        if self.membership(&slot)? == Membership::Member {
            return Err(FlowError::DuplicateTask {
                task: graph.display_name(task.id()),
                flow: self.name().to_string(),
            });
        }

        self.bind(&mut graph, task, &mut slot);
        Ok(())
    }

    /// Add a dependency edge
    ///
    /// Both endpoints must belong to this flow or be detached; detached
    /// endpoints are registered on success. Rejected edges (foreign task,
    /// duplicate, cycle) leave the flow untouched.
    pub fn add_edge(&self, edge: Edge) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let (up, down) = (edge.upstream().clone(), edge.downstream().clone());
        let mut slots = SlotPair::lock(&up, &down);

        let up_membership = self.membership(slots.upstream())?;
        let down_membership = self.membership(slots.downstream())?;

        if graph.contains_edge(&edge) {
            return Err(FlowError::DuplicateEdge {
                edge: describe(&graph, &edge),
                flow: self.name().to_string(),
            });
        }

        if let Some(cycle) = graph.cycle_through(&edge) {
            warn!(flow = %self.name(), %cycle, "Rejected edge: would create a cycle");
            return Err(FlowError::CycleDetected { cycle });
        }

        // checks passed: nothing below can fail
        if up_membership == Membership::Detached {
            self.bind(&mut graph, &up, slots.upstream_mut());
        }
        if down_membership == Membership::Detached && up != down {
            self.bind(&mut graph, &down, slots.downstream_mut());
        }

        debug!(
            flow = %self.name(),
            edge = %describe(&graph, &edge),
            "Added edge"
        );
        graph.insert_edge(edge);
        Ok(())
    }

    /// Register a task built from a callable
    ///
    /// The base label is the callable's declared name (`fn extract` →
    /// `extract_1`); closures fall back to the generic label. The callable
    /// itself is not stored: execution belongs to the runner.
    pub fn task_from_fn<F>(&self, _callable: F, name: Option<&str>) -> Result<Task> {
        let builder = TaskBuilder::default().flow(self);
        let builder = match name {
            Some(name) => builder.name(name),
            None => match callable_label::<F>() {
                Some(label) => builder.label(label),
                None => builder,
            },
        };
        builder.build()
    }

    fn membership(&self, slot: &Option<Binding>) -> Result<Membership> {
        match slot {
            None => Ok(Membership::Detached),
            Some(binding) if self.owns(binding) => Ok(Membership::Member),
            Some(binding) if binding.flow.strong_count() == 0 => Err(FlowError::OrphanedTask {
                task: binding.name.to_string(),
            }),
            Some(binding) => Err(FlowError::ForeignTask {
                task: binding.name.to_string(),
                flow: self.name().to_string(),
            }),
        }
    }

    fn owns(&self, binding: &Binding) -> bool {
        std::ptr::eq(binding.flow.as_ptr(), Arc::as_ptr(&self.inner))
    }

    /// Name + bind + record a detached task (caller holds both locks)
    fn bind(&self, graph: &mut FlowGraph, task: &Task, slot: &mut Option<Binding>) {
        let proposal = graph.names.propose(task.label(), task.has_explicit_name());
        let name = Arc::clone(&proposal.name);
        graph.names.commit(proposal);

        *slot = Some(Binding {
            flow: Arc::downgrade(&self.inner),
            name: Arc::clone(&name),
        });
        debug!(flow = %self.name(), task = %name, id = %task.id(), "Registered task");
        graph.insert_task(task.clone(), name);
    }

    /// Re-create a task from a serialized document with its exact id and name
    pub(crate) fn restore_task(&self, id: TaskId, name: Arc<str>) -> Result<Task> {
        let mut graph = self.inner.graph.lock();
        if graph.contains(id) {
            return Err(FlowError::invalid_document(format!(
                "task id '{id}' appears more than once"
            )));
        }
        if graph.names.is_taken(&name) {
            return Err(FlowError::invalid_document(format!(
                "task name '{name}' appears more than once"
            )));
        }

        let task = Task::unbound(id, Arc::clone(&name), true);
        *task.slot() = Some(Binding {
            flow: Arc::downgrade(&self.inner),
            name: Arc::clone(&name),
        });
        graph.names.restore(Arc::clone(&name));
        graph.insert_task(task.clone(), name);
        Ok(task)
    }

    // ─────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────

    pub fn contains(&self, task: &Task) -> bool {
        self.inner.graph.lock().contains(task.id())
    }

    pub fn len(&self) -> usize {
        self.inner.graph.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks in registration order
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.graph.lock().tasks().to_vec()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> Vec<Edge> {
        self.inner.graph.lock().edges().to_vec()
    }

    /// Exact-match lookup by task name
    pub fn get_task(&self, name: &str) -> Result<Task> {
        self.inner
            .graph
            .lock()
            .task_by_name(name)
            .cloned()
            .ok_or_else(|| FlowError::TaskNotFound {
                name: name.to_string(),
                flow: self.name().to_string(),
            })
    }

    /// Direct predecessors of `task` (empty for roots and non-members)
    pub fn upstream_tasks(&self, task: &Task) -> FxHashSet<Task> {
        self.inner
            .graph
            .lock()
            .edges_to(task.id())
            .map(|edge| edge.upstream().clone())
            .collect()
    }

    /// Direct successors of `task` (empty for leaves and non-members)
    pub fn downstream_tasks(&self, task: &Task) -> FxHashSet<Task> {
        self.inner
            .graph
            .lock()
            .edges_from(task.id())
            .map(|edge| edge.downstream().clone())
            .collect()
    }

    /// Edges whose downstream is `task`
    pub fn edges_to(&self, task: &Task) -> FxHashSet<Edge> {
        self.inner
            .graph
            .lock()
            .edges_to(task.id())
            .cloned()
            .collect()
    }

    /// Edges whose upstream is `task`
    pub fn edges_from(&self, task: &Task) -> FxHashSet<Edge> {
        self.inner
            .graph
            .lock()
            .edges_from(task.id())
            .cloned()
            .collect()
    }

    /// Whether `downstream` transitively depends on `upstream`
    pub fn has_path(&self, upstream: &Task, downstream: &Task) -> bool {
        let graph = self.inner.graph.lock();
        graph.contains(upstream.id())
            && graph.contains(downstream.id())
            && graph.has_path(upstream.id(), downstream.id())
    }

    /// Tasks in dependency order
    ///
    /// Kahn's algorithm; independent tasks come out in registration order,
    /// so repeated calls on an unchanged flow return the same sequence.
    pub fn topological_order(&self) -> Result<Vec<Task>> {
        let graph = self.inner.graph.lock();
        let (order, complete) = graph.kahn_order();
        if !complete {
            let stuck: Vec<&str> = graph
                .unordered(&order)
                .into_iter()
                .map(|position| graph.name_at(position).as_ref())
                .collect();
            error!(flow = %self.name(), "Flow graph holds a cycle despite insertion checks");
            return Err(FlowError::CycleDetected {
                cycle: stuck.join(" → "),
            });
        }
        let tasks = order
            .into_iter()
            .map(|position| graph.task_at(position).clone())
            .collect();
        Ok(tasks)
    }

    /// Topological order with ids and names, used by the serializer
    pub(crate) fn ordered_entries(&self) -> Result<Vec<(TaskId, Arc<str>)>> {
        let graph = self.inner.graph.lock();
        let (order, complete) = graph.kahn_order();
        if !complete {
            return Err(FlowError::CycleDetected {
                cycle: graph
                    .unordered(&order)
                    .into_iter()
                    .map(|position| graph.name_at(position).to_string())
                    .collect::<Vec<_>>()
                    .join(" → "),
            });
        }
        let entries = order
            .into_iter()
            .map(|position| {
                (
                    graph.task_at(position).id(),
                    Arc::clone(graph.name_at(position)),
                )
            })
            .collect();
        Ok(entries)
    }

    // ─────────────────────────────────────────────────────────────
    // Ambient construction scope
    // ─────────────────────────────────────────────────────────────

    /// Make this flow the current one until the guard drops
    ///
    /// ```rust,ignore
    /// let flow = Flow::new("etl")?;
    /// {
    ///     let _scope = flow.enter();
    ///     let extract = Task::named("extract")?;
    /// }
    /// ```
    pub fn enter(&self) -> FlowScope {
        context::push(self.clone())
    }

    /// Run `body` with this flow as the current one
    pub fn scope<R>(&self, body: impl FnOnce(&Flow) -> R) -> R {
        let _scope = self.enter();
        body(self)
    }
}

impl PartialEq for Flow {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Flow {}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (tasks, edges) = {
            let graph = self.inner.graph.lock();
            (graph.len(), graph.edges().len())
        };
        f.debug_struct("Flow")
            .field("namespace", &self.inner.namespace)
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("id", &self.id())
            .field("tasks", &tasks)
            .field("edges", &edges)
            .finish()
    }
}

/// Iterating a flow yields its topological order
///
/// The graph is acyclic by construction; should the order ever come out
/// incomplete, the stuck tasks follow in registration order.
impl IntoIterator for &Flow {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        let graph = self.inner.graph.lock();
        let (mut order, complete) = graph.kahn_order();
        if !complete {
            error!(flow = %self.name(), "Flow graph holds a cycle despite insertion checks");
            let rest = graph.unordered(&order);
            order.extend(rest);
        }
        let tasks: Vec<Task> = order
            .into_iter()
            .map(|position| graph.task_at(position).clone())
            .collect();
        tasks.into_iter()
    }
}

/// Builder for [`Flow`]
///
/// Namespace and version default from the process-wide configuration
/// unless a config is supplied with [`FlowBuilder::defaults`].
#[derive(Default)]
pub struct FlowBuilder {
    name: Option<String>,
    namespace: Option<String>,
    version: Option<String>,
    schedule: Option<Schedule>,
    defaults: Option<Arc<TaskflowConfig>>,
}

impl FlowBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn schedule(mut self, schedule: impl Into<Schedule>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn defaults(mut self, config: Arc<TaskflowConfig>) -> Self {
        self.defaults = Some(config);
        self
    }

    pub fn build(self) -> Result<Flow> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(FlowError::MissingFlowName),
        };
        let defaults = self.defaults.unwrap_or_else(config::current);

        let namespace = self
            .namespace
            .unwrap_or_else(|| defaults.default_namespace().to_string());
        let version = self
            .version
            .unwrap_or_else(|| defaults.default_version().to_string());

        Ok(Flow {
            inner: Arc::new(FlowInner {
                namespace: Arc::from(namespace),
                name: Arc::from(name),
                version: Arc::from(version),
                schedule: self.schedule,
                id: OnceCell::new(),
                graph: Mutex::new(FlowGraph::default()),
            }),
        })
    }
}

/// Both endpoint binding guards of an edge, locked lowest id first
struct SlotPair<'a> {
    upstream: BindingSlot<'a>,
    /// `None` for a self-loop (same task on both ends)
    downstream: Option<BindingSlot<'a>>,
}

impl<'a> SlotPair<'a> {
    fn lock(up: &'a Task, down: &'a Task) -> Self {
        if up.id() == down.id() {
            return Self {
                upstream: up.slot(),
                downstream: None,
            };
        }
        if up.id() < down.id() {
            let upstream = up.slot();
            let downstream = down.slot();
            Self {
                upstream,
                downstream: Some(downstream),
            }
        } else {
            let downstream = down.slot();
            let upstream = up.slot();
            Self {
                upstream,
                downstream: Some(downstream),
            }
        }
    }

    fn upstream(&self) -> &Option<Binding> {
        &*self.upstream
    }

    fn downstream(&self) -> &Option<Binding> {
        match self.downstream.as_deref() {
            Some(slot) => slot,
            None => &*self.upstream,
        }
    }

    fn upstream_mut(&mut self) -> &mut Option<Binding> {
        &mut *self.upstream
    }

    fn downstream_mut(&mut self) -> &mut Option<Binding> {
        match self.downstream.as_deref_mut() {
            Some(slot) => slot,
            None => &mut *self.upstream,
        }
    }
}

/// `up → down [key]` using graph-side names (never locks task bindings)
fn describe(graph: &FlowGraph, edge: &Edge) -> String {
    let (up, down) = edge.endpoints();
    let up_name = if graph.contains(up) {
        graph.display_name(up)
    } else {
        edge.upstream().label().to_string()
    };
    let down_name = if graph.contains(down) {
        graph.display_name(down)
    } else {
        edge.downstream().label().to_string()
    };
    match edge.key() {
        Some(key) => format!("{up_name} → {down_name} [{key}]"),
        None => format!("{up_name} → {down_name}"),
    }
}

/// Last path segment of a callable's type name, `None` for closures
fn callable_label<F>() -> Option<&'static str> {
    let full = std::any::type_name::<F>();
    let last = full.rsplit("::").next().unwrap_or(full);
    if last.is_empty() || last.contains(['{', '<', '>', '(']) {
        None
    } else {
        Some(last)
    }
}
