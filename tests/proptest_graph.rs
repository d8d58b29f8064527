//! Property-Based Testing for flow graphs
//!
//! Random edge lists are applied to a flow; whatever the flow accepts must
//! stay acyclic, and rejected edges must leave it untouched.

mod common;

use proptest::prelude::*;
use rustc_hash::FxHashMap;
use taskflow::{Edge, ErrorKind, Flow, Task, TaskId};

use common::tasks;

prop_compose! {
    /// Node count plus candidate edges over those nodes
    fn arb_graph()(nodes in 1usize..12)(
        nodes in Just(nodes),
        edges in prop::collection::vec((0..nodes, 0..nodes), 0..40),
    ) -> (usize, Vec<(usize, usize)>) {
        (nodes, edges)
    }
}

/// Sorted `(upstream, downstream, key)` triples
fn edge_set(flow: &Flow) -> Vec<(TaskId, TaskId, Option<String>)> {
    let mut set: Vec<_> = flow
        .edges()
        .iter()
        .map(|edge| (edge.upstream().id(), edge.downstream().id(), edge.key().map(str::to_string)))
        .collect();
    set.sort();
    set
}

fn positions(order: &[Task]) -> FxHashMap<Task, usize> {
    order.iter().cloned().enumerate().map(|(i, t)| (t, i)).collect()
}

proptest! {
    /// Every accepted edge points forward in the topological order
    #[test]
    fn test_order_respects_every_edge((nodes, edges) in arb_graph()) {
        let flow = Flow::new("prop").unwrap();
        let tasks = tasks(&flow, nodes);
        common::wire(&flow, &tasks, &edges);

        let order = flow.topological_order().unwrap();
        prop_assert_eq!(order.len(), nodes);
        let at = positions(&order);
        for edge in flow.edges() {
            prop_assert!(at[edge.upstream()] < at[edge.downstream()]);
        }
        prop_assert_eq!(flow.topological_order().unwrap(), order);
    }

    /// A rejected edge changes neither tasks nor edges
    #[test]
    fn test_rejected_edges_leave_flow_unchanged((nodes, edges) in arb_graph()) {
        let flow = Flow::new("prop").unwrap();
        let tasks = tasks(&flow, nodes);

        for (up, down) in edges {
            let before = (flow.tasks(), flow.edges());
            match flow.add_edge(Edge::new(&tasks[up], &tasks[down])) {
                Ok(()) => prop_assert_eq!(flow.edges().len(), before.1.len() + 1),
                Err(err) => {
                    prop_assert!(matches!(err.kind(), ErrorKind::Cycle | ErrorKind::Ownership));
                    prop_assert_eq!((flow.tasks(), flow.edges()), before);
                }
            }
        }
    }

    /// Closing a path back onto its start is always a cycle
    #[test]
    fn test_back_edge_is_cycle(length in 1usize..10) {
        let flow = Flow::new("prop").unwrap();
        let tasks = tasks(&flow, length);
        for pair in tasks.windows(2) {
            flow.add_edge(Edge::new(&pair[0], &pair[1])).unwrap();
        }

        let err = flow.add_edge(Edge::new(&tasks[length - 1], &tasks[0])).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    /// Serialization keeps ids, order, endpoints and routing keys
    #[test]
    fn test_roundtrip_keeps_order((nodes, edges) in arb_graph()) {
        let flow = Flow::new("prop").unwrap();
        let tasks = tasks(&flow, nodes);
        for (i, &(up, down)) in edges.iter().enumerate() {
            let edge = match i % 3 {
                0 => Edge::new(&tasks[up], &tasks[down]),
                n => Edge::pipe(&tasks[up], &tasks[down], format!("key_{n}")),
            };
            let _ = flow.add_edge(edge);
        }

        let restored = Flow::deserialize(&flow.serialize().unwrap()).unwrap();
        let ids = |f: &Flow| f.topological_order().unwrap().iter().map(Task::id).collect::<Vec<_>>();
        prop_assert_eq!(ids(&restored), ids(&flow));
        prop_assert_eq!(edge_set(&restored), edge_set(&flow));
    }
}
