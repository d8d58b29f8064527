//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use taskflow::{Edge, Flow, IntervalSchedule, Task};

pub const DAY: Duration = Duration::from_secs(86_400);

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// `n` unnamed tasks registered on `flow` (Task_1 … Task_n)
pub fn tasks(flow: &Flow, n: usize) -> Vec<Task> {
    (0..n)
        .map(|_| Task::builder().flow(flow).build().unwrap())
        .collect()
}

/// Daily flow starting 2017-01-01 with `t1 → t2`
pub fn scheduled_pair() -> (Flow, Task, Task) {
    let schedule = IntervalSchedule::new(utc(2017, 1, 1, 0), DAY).unwrap();
    let flow = Flow::builder().name("test").schedule(schedule).build().unwrap();
    let (t1, t2) = flow
        .scope(|_| -> taskflow::Result<_> { Ok((Task::new()?, Task::new()?)) })
        .unwrap();
    t1.run_before(&t2).unwrap();
    (flow, t1, t2)
}

/// Wire `edges` (index pairs) into `tasks`, ignoring rejected ones
pub fn wire(flow: &Flow, tasks: &[Task], edges: &[(usize, usize)]) -> usize {
    edges
        .iter()
        .filter(|(up, down)| flow.add_edge(Edge::new(&tasks[*up], &tasks[*down])).is_ok())
        .count()
}
