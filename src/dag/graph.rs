//! FlowGraph - adjacency storage behind a `Flow`
//!
//! Performance notes:
//! - FxHashMap for faster hashing (non-crypto)
//! - SmallVec for stack-allocated small adjacency lists (0-4 items)
//!
//! The graph never locks task bindings: names are mirrored here so that
//! error messages can be built while the caller holds binding guards.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::edge::Edge;
use super::id::TaskId;
use super::names::NameAllocator;
use super::task::Task;

/// Stack-allocated edge indices: most tasks have 0-4 neighbours
pub type EdgeVec = SmallVec<[usize; 4]>;

#[derive(Default)]
pub(crate) struct FlowGraph {
    /// Registered tasks in registration order
    tasks: Vec<Task>,
    /// Names parallel to `tasks`
    task_names: Vec<Arc<str>>,
    /// task_id -> position in `tasks`
    index: FxHashMap<TaskId, usize>,
    /// name -> position in `tasks`
    by_name: FxHashMap<Arc<str>, usize>,
    /// Edges in insertion order
    edges: Vec<Edge>,
    edge_set: FxHashSet<Edge>,
    /// task_id -> indices of edges leaving it
    outgoing: FxHashMap<TaskId, EdgeVec>,
    /// task_id -> indices of edges entering it
    incoming: FxHashMap<TaskId, EdgeVec>,
    pub names: NameAllocator,
}

impl FlowGraph {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edge_set.contains(edge)
    }

    pub fn task_by_name(&self, name: &str) -> Option<&Task> {
        self.by_name.get(name).map(|&i| &self.tasks[i])
    }

    /// Name of a registered task, falling back to its id
    pub fn display_name(&self, id: TaskId) -> String {
        self.index
            .get(&id)
            .map(|&i| self.task_names[i].to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Record a task whose binding was just set to this flow
    pub fn insert_task(&mut self, task: Task, name: Arc<str>) {
        let position = self.tasks.len();
        let id = task.id();
        self.index.insert(id, position);
        self.by_name.insert(Arc::clone(&name), position);
        self.outgoing.entry(id).or_default();
        self.incoming.entry(id).or_default();
        self.tasks.push(task);
        self.task_names.push(name);
    }

    /// Record an edge that already passed the ownership and cycle checks
    pub fn insert_edge(&mut self, edge: Edge) {
        let position = self.edges.len();
        let (up, down) = edge.endpoints();
        self.outgoing.entry(up).or_default().push(position);
        self.incoming.entry(down).or_default().push(position);
        self.edge_set.insert(edge.clone());
        self.edges.push(edge);
    }

    pub fn edges_from(&self, id: TaskId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    pub fn edges_to(&self, id: TaskId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: TaskId, to: TaskId) -> bool {
        self.path(from, to).is_some()
    }

    /// Shortest path `from → … → to` over existing edges (BFS)
    fn path(&self, from: TaskId, to: TaskId) -> Option<Vec<TaskId>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut parent: FxHashMap<TaskId, TaskId> = FxHashMap::default();
        let mut queue: VecDeque<TaskId> = VecDeque::new();
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            for edge in self.edges_from(current) {
                let next = edge.downstream().id();
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, current);
                if next == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Cycle that `edge` would close, rendered `a → b → … → a`
    ///
    /// The candidate `up → down` closes a cycle iff `up` is reachable
    /// from `down`; a self-loop is the degenerate case.
    pub fn cycle_through(&self, edge: &Edge) -> Option<String> {
        let (up, down) = edge.endpoints();
        let path = self.path(down, up)?;

        let mut rendered: Vec<String> = Vec::with_capacity(path.len() + 1);
        rendered.push(self.display_name(up));
        if up != down {
            rendered.extend(path.iter().map(|&id| self.display_name(id)));
        } else {
            rendered.push(self.display_name(up));
        }
        Some(rendered.join(" → "))
    }

    /// Kahn's algorithm, ties broken by registration position (lowest first)
    ///
    /// Returns positions in order and whether every task was emitted.
    /// An incomplete result means the graph holds a cycle.
    pub fn kahn_order(&self) -> (Vec<usize>, bool) {
        let mut in_degree: Vec<usize> = self
            .tasks
            .iter()
            .map(|task| self.incoming.get(&task.id()).map_or(0, SmallVec::len))
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(position, _)| Reverse(position))
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(Reverse(position)) = ready.pop() {
            order.push(position);
            for edge in self.edges_from(self.tasks[position].id()) {
                let Some(&next) = self.index.get(&edge.downstream().id()) else {
                    continue;
                };
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        let complete = order.len() == self.tasks.len();
        (order, complete)
    }

    /// Tasks that never made it into `order` (cycle members), registration order
    pub fn unordered(&self, order: &[usize]) -> Vec<usize> {
        let emitted: FxHashSet<usize> = order.iter().copied().collect();
        (0..self.tasks.len())
            .filter(|position| !emitted.contains(position))
            .collect()
    }

    pub fn task_at(&self, position: usize) -> &Task {
        &self.tasks[position]
    }

    pub fn name_at(&self, position: usize) -> &Arc<str> {
        &self.task_names[position]
    }
}
