//! Ambient construction context
//!
//! A thread-local stack of open flows. `Flow::enter` pushes and returns a
//! [`FlowScope`] guard; dropping the guard (normally or while unwinding)
//! pops it. Task constructors without an explicit flow attach to the top.
//!
//! Each thread has its own stack, so concurrent construction on different
//! threads never sees another thread's scope. The guard is `!Send`.

use std::cell::RefCell;
use std::marker::PhantomData;

use tracing::trace;

use super::flow::Flow;

thread_local! {
    static STACK: RefCell<Vec<Flow>> = const { RefCell::new(Vec::new()) };
}

/// Innermost open flow on this thread
pub fn current() -> Option<Flow> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// Number of open scopes on this thread
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

pub(crate) fn push(flow: Flow) -> FlowScope {
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(flow.clone());
        stack.len()
    });
    trace!(flow = %flow.name(), depth, "Entered flow scope");
    FlowScope {
        flow,
        depth,
        _not_send: PhantomData,
    }
}

/// Guard keeping a flow current until dropped
///
/// Dropping an outer guard before an inner one also closes the inner scope.
#[must_use = "the flow stops being current as soon as the scope is dropped"]
pub struct FlowScope {
    flow: Flow,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl FlowScope {
    pub fn flow(&self) -> &Flow {
        &self.flow
    }
}

impl Drop for FlowScope {
    fn drop(&mut self) {
        // TLS may already be gone during thread teardown
        let _ = STACK.try_with(|stack| {
            stack.borrow_mut().truncate(self.depth - 1);
        });
        trace!(flow = %self.flow.name(), depth = self.depth, "Left flow scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Task;

    #[test]
    fn test_no_scope_by_default() {
        assert!(current().is_none());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_scope_push_and_pop() {
        let flow = Flow::new("test").unwrap();
        {
            let scope = flow.enter();
            assert_eq!(scope.flow(), &flow);
            assert_eq!(current(), Some(flow.clone()));
        }
        assert!(current().is_none());
    }

    #[test]
    fn test_nested_scopes_restore_previous() {
        let outer = Flow::new("outer").unwrap();
        let inner = Flow::new("inner").unwrap();

        let _outer_scope = outer.enter();
        {
            let _inner_scope = inner.enter();
            assert_eq!(current(), Some(inner.clone()));
            assert_eq!(depth(), 2);
        }
        assert_eq!(current(), Some(outer.clone()));
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_scope_pops_on_panic() {
        let flow = Flow::new("test").unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            flow.scope(|_| panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn test_outer_drop_closes_inner() {
        let outer = Flow::new("outer").unwrap();
        let inner = Flow::new("inner").unwrap();

        let outer_scope = outer.enter();
        let inner_scope = inner.enter();
        drop(outer_scope);
        assert_eq!(depth(), 0);
        drop(inner_scope);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_scopes_are_thread_local() {
        let flow = Flow::new("test").unwrap();
        let _scope = flow.enter();

        let seen = std::thread::spawn(|| (current().is_none(), Task::new().is_err()))
            .join()
            .unwrap();
        assert_eq!(seen, (true, true));
        assert_eq!(current(), Some(flow));
    }
}
