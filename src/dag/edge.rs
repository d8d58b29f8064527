//! Edge - directed dependency between two tasks
//!
//! An edge with a routing key is a *pipe*: the upstream task's result is
//! exposed to the downstream task under that key. Without a key the edge
//! only orders execution.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::id::TaskId;
use super::task::Task;

/// Dependency `upstream → downstream`
///
/// A pure value: building an edge never touches a flow. Equality and
/// hashing use `(upstream id, downstream id, key)`.
#[derive(Clone)]
pub struct Edge {
    upstream: Task,
    downstream: Task,
    key: Option<Arc<str>>,
}

impl Edge {
    /// Ordering-only dependency
    pub fn new(upstream: &Task, downstream: &Task) -> Self {
        Self {
            upstream: upstream.clone(),
            downstream: downstream.clone(),
            key: None,
        }
    }

    /// Dependency that routes the upstream result to `key`
    pub fn pipe(upstream: &Task, downstream: &Task, key: impl Into<Arc<str>>) -> Self {
        Self {
            upstream: upstream.clone(),
            downstream: downstream.clone(),
            key: Some(key.into()),
        }
    }

    pub fn upstream(&self) -> &Task {
        &self.upstream
    }

    pub fn downstream(&self) -> &Task {
        &self.downstream
    }

    /// Routing key, `None` for ordering-only edges
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_pipe(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn endpoints(&self) -> (TaskId, TaskId) {
        (self.upstream.id(), self.downstream.id())
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.endpoints() == other.endpoints() && self.key == other.key
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoints().hash(state);
        self.key.hash(state);
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("upstream", &self.upstream.id())
            .field("downstream", &self.downstream.id())
            .field("key", &self.key)
            .finish()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.upstream, self.downstream)?;
        if let Some(key) = &self.key {
            write!(f, " [{key}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_edge_is_pure_value() {
        let a = Task::detached("a");
        let b = Task::detached("b");
        let edge = Edge::new(&a, &b);

        assert_eq!(edge.upstream(), &a);
        assert_eq!(edge.downstream(), &b);
        assert!(!edge.is_pipe());
        assert!(a.is_detached() && b.is_detached());
    }

    #[test]
    fn test_pipe_carries_key() {
        let a = Task::detached("a");
        let b = Task::detached("b");
        let edge = Edge::pipe(&a, &b, "rows");

        assert!(edge.is_pipe());
        assert_eq!(edge.key(), Some("rows"));
        assert_eq!(edge.to_string(), "a (detached) → b (detached) [rows]");
    }

    #[test]
    fn test_identity_includes_key() {
        let a = Task::detached("a");
        let b = Task::detached("b");

        let mut set = FxHashSet::default();
        assert!(set.insert(Edge::new(&a, &b)));
        assert!(!set.insert(Edge::new(&a, &b)));
        assert!(set.insert(Edge::pipe(&a, &b, "x")));
        assert!(set.insert(Edge::new(&b, &a)));
        assert_eq!(set.len(), 3);
    }
}
