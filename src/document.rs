//! Flow documents - persisted form of a flow
//!
//! A [`FlowDocument`] snapshots identity, nodes (topological order), edges
//! and the schedule. JSON is the canonical encoding; YAML carries the same
//! document for hand-written flows.
//!
//! ```json
//! {
//!   "namespace": "default",
//!   "name": "etl",
//!   "version": "1",
//!   "id": "flow-…",
//!   "nodes": [{ "id": "task-…", "name": "extract_1" }],
//!   "edges": [{ "upstream_id": "task-…", "downstream_id": "task-…", "routing_key": null }],
//!   "schedule": { "type": "interval", "start_date": "…", "interval": { "secs": 86400, "nanos": 0 } }
//! }
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dag::{Edge, Flow, FlowId, Task, TaskId};
use crate::error::{FlowError, Result};
use crate::schedule::Schedule;

/// Serialized flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tasks in topological order
    #[serde(default)]
    pub nodes: Vec<TaskDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
    /// Tagged schedule, decoded with [`schedule_from_value`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub upstream_id: String,
    pub downstream_id: String,
    #[serde(default)]
    pub routing_key: Option<String>,
}

/// Decode a standalone schedule value, checking its `type` tag first
pub fn schedule_from_value(value: Value) -> Result<Schedule> {
    Schedule::from_value(value)
}

impl Flow {
    /// Snapshot this flow as a document
    pub fn to_document(&self) -> Result<FlowDocument> {
        let nodes = self
            .ordered_entries()?
            .into_iter()
            .map(|(id, name)| TaskDocument {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();

        let edges = self
            .edges()
            .iter()
            .map(|edge| EdgeDocument {
                upstream_id: edge.upstream().id().to_string(),
                downstream_id: edge.downstream().id().to_string(),
                routing_key: edge.key().map(str::to_string),
            })
            .collect();

        let schedule = self.schedule().map(Schedule::to_value).transpose()?;

        Ok(FlowDocument {
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
            version: self.version().to_string(),
            id: self.id().map(|id| id.to_string()),
            nodes,
            edges,
            schedule,
        })
    }

    /// Rebuild a flow from a document
    ///
    /// Task ids and names come back exactly as stored; the edges are
    /// re-validated, so a cyclic document fails with `CycleDetected`.
    pub fn from_document(doc: FlowDocument) -> Result<Flow> {
        let mut builder = Flow::builder()
            .name(doc.name)
            .namespace(doc.namespace)
            .version(doc.version);
        if let Some(value) = doc.schedule {
            builder = builder.schedule(schedule_from_value(value)?);
        }
        let flow = builder.build()?;

        if let Some(raw) = doc.id.as_deref() {
            flow.assign_id(FlowId::parse(raw)?);
        }

        let mut restored: FxHashMap<TaskId, Task> = FxHashMap::default();
        for entry in doc.nodes {
            let id = TaskId::parse(&entry.id)?;
            if entry.name.trim().is_empty() {
                return Err(FlowError::invalid_document(format!(
                    "task '{id}' has an empty name"
                )));
            }
            let task = flow.restore_task(id, Arc::from(entry.name))?;
            restored.insert(id, task);
        }

        for entry in doc.edges {
            let upstream = lookup(&restored, &entry.upstream_id)?;
            let downstream = lookup(&restored, &entry.downstream_id)?;
            let edge = match entry.routing_key {
                Some(key) => Edge::pipe(upstream, downstream, key),
                None => Edge::new(upstream, downstream),
            };
            flow.add_edge(edge).map_err(|err| match err {
                FlowError::DuplicateEdge { edge, .. } => {
                    FlowError::invalid_document(format!("edge {edge} appears more than once"))
                }
                other => other,
            })?;
        }

        debug!(flow = %flow.name(), tasks = flow.len(), "Restored flow from document");
        Ok(flow)
    }

    /// Canonical JSON form
    #[instrument(skip(self), fields(flow = %self.name()))]
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document()?)?)
    }

    #[instrument(skip(json), fields(bytes = json.len()))]
    pub fn deserialize(json: &str) -> Result<Flow> {
        let doc: FlowDocument = serde_json::from_str(json)?;
        Flow::from_document(doc)
    }

    #[instrument(skip(self), fields(flow = %self.name()))]
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_document()?)?)
    }

    #[instrument(skip(yaml), fields(bytes = yaml.len()))]
    pub fn from_yaml(yaml: &str) -> Result<Flow> {
        let doc: FlowDocument = serde_yaml::from_str(yaml)?;
        Flow::from_document(doc)
    }
}

fn lookup<'a>(restored: &'a FxHashMap<TaskId, Task>, raw: &str) -> Result<&'a Task> {
    let id = TaskId::parse(raw)?;
    restored.get(&id).ok_or_else(|| {
        FlowError::invalid_document(format!("edge references unknown task '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schedule::IntervalSchedule;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn diamond() -> (Flow, Vec<Task>) {
        let flow = Flow::new("diamond").unwrap();
        let tasks: Vec<Task> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| Task::builder().name(*name).flow(&flow).build().unwrap())
            .collect();
        flow.add_edge(Edge::new(&tasks[0], &tasks[1])).unwrap();
        flow.add_edge(Edge::new(&tasks[0], &tasks[2])).unwrap();
        flow.add_edge(Edge::pipe(&tasks[1], &tasks[3], "left")).unwrap();
        flow.add_edge(Edge::pipe(&tasks[2], &tasks[3], "right")).unwrap();
        (flow, tasks)
    }

    fn names(flow: &Flow) -> Vec<String> {
        flow.topological_order()
            .unwrap()
            .iter()
            .map(|task| task.to_string())
            .collect()
    }

    #[test]
    fn test_document_lists_tasks_in_topological_order() {
        let flow = Flow::new("reversed").unwrap();
        let late = Task::builder().name("late").flow(&flow).build().unwrap();
        let early = Task::builder().name("early").flow(&flow).build().unwrap();
        flow.add_edge(Edge::new(&early, &late)).unwrap();

        let doc = flow.to_document().unwrap();
        let order: Vec<&str> = doc.nodes.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let (flow, tasks) = diamond();
        let restored = Flow::deserialize(&flow.serialize().unwrap()).unwrap();

        assert_eq!(names(&restored), names(&flow));
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.edges().len(), 4);
        let d = restored.get_task("d").unwrap();
        assert_eq!(d.id(), tasks[3].id());
        let keys: Vec<Option<String>> = {
            let mut keys: Vec<_> = restored
                .edges_to(&d)
                .iter()
                .map(|edge| edge.key().map(str::to_string))
                .collect();
            keys.sort();
            keys
        };
        assert_eq!(keys, vec![Some("left".into()), Some("right".into())]);
    }

    #[test]
    fn test_roundtrip_keeps_id_and_identity() {
        let flow = Flow::builder()
            .name("etl")
            .namespace("analytics")
            .version("7")
            .build()
            .unwrap();
        let id = flow.assign_id(FlowId::new());

        let restored = Flow::deserialize(&flow.serialize().unwrap()).unwrap();
        assert_eq!(restored.id(), Some(id));
        assert_eq!(restored.namespace(), "analytics");
        assert_eq!(restored.version(), "7");
    }

    #[test]
    fn test_id_omitted_until_assigned() {
        let flow = Flow::new("fresh").unwrap();
        let value: Value = serde_json::from_str(&flow.serialize().unwrap()).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("schedule").is_none());
    }

    #[test]
    fn test_schedule_roundtrip() {
        let start = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let schedule = IntervalSchedule::new(start, Duration::from_secs(3600)).unwrap();
        let flow = Flow::builder().name("hourly").schedule(schedule).build().unwrap();

        let restored = Flow::deserialize(&flow.serialize().unwrap()).unwrap();
        let after = Utc.with_ymd_and_hms(2017, 1, 1, 0, 30, 0).unwrap();
        assert_eq!(
            restored.schedule().unwrap().next_n(after, 3),
            flow.schedule().unwrap().next_n(after, 3)
        );
    }

    #[test]
    fn test_yaml_roundtrip() {
        let (flow, _) = diamond();
        let restored = Flow::from_yaml(&flow.to_yaml().unwrap()).unwrap();
        assert_eq!(names(&restored), names(&flow));
    }

    #[test]
    fn test_restored_flow_keeps_numbering() {
        let flow = Flow::new("numbered").unwrap();
        Task::builder().flow(&flow).build().unwrap();
        Task::builder().flow(&flow).build().unwrap();

        let restored = Flow::deserialize(&flow.serialize().unwrap()).unwrap();
        let next = Task::builder().flow(&restored).build().unwrap();
        assert_eq!(next.name().as_deref(), Some("Task_3"));
    }

    #[test]
    fn test_unknown_schedule_type_rejected() {
        let doc = json!({
            "namespace": "default", "name": "f", "version": "1",
            "schedule": { "type": "lunar", "phase": "full" }
        });
        let err = Flow::deserialize(&doc.to_string()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownScheduleType { .. }));
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_edge_to_unknown_task_rejected() {
        let (flow, _) = diamond();
        let mut doc = flow.to_document().unwrap();
        doc.edges[0].downstream_id = TaskId::new().to_string();

        let err = Flow::from_document(doc).unwrap_err();
        assert_eq!(err.code(), "FLOW-051");
    }

    #[test]
    fn test_flow_id_in_task_slot_is_type_mismatch() {
        let (flow, _) = diamond();
        let mut doc = flow.to_document().unwrap();
        doc.nodes[0].id = FlowId::new().to_string();

        let err = Flow::from_document(doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_cyclic_document_rejected() {
        let (flow, _) = diamond();
        let mut doc = flow.to_document().unwrap();
        let first = doc.nodes[0].id.clone();
        let last = doc.nodes[3].id.clone();
        doc.edges.push(EdgeDocument {
            upstream_id: last,
            downstream_id: first,
            routing_key: None,
        });

        let err = Flow::from_document(doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let (flow, _) = diamond();

        let mut doc = flow.to_document().unwrap();
        doc.nodes.push(doc.nodes[0].clone());
        assert_eq!(Flow::from_document(doc).unwrap_err().code(), "FLOW-051");

        let mut doc = flow.to_document().unwrap();
        doc.edges.push(doc.edges[0].clone());
        assert_eq!(Flow::from_document(doc).unwrap_err().code(), "FLOW-051");
    }

    #[test]
    fn test_wire_field_names() {
        let flow = Flow::new("wire").unwrap();
        let (t1, t2) = (
            Task::builder().flow(&flow).build().unwrap(),
            Task::builder().flow(&flow).build().unwrap(),
        );
        t1.pipe_to(&t2, "rows").unwrap();

        let value: Value = serde_json::from_str(&flow.serialize().unwrap()).unwrap();
        let mut top: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        top.sort();
        assert_eq!(top, vec!["edges", "name", "namespace", "nodes", "version"]);

        let node = value["nodes"][0].as_object().unwrap();
        assert!(node.contains_key("id") && node.contains_key("name"));

        let edge = &value["edges"][0];
        let mut edge_keys: Vec<&str> = edge.as_object().unwrap().keys().map(String::as_str).collect();
        edge_keys.sort();
        assert_eq!(edge_keys, vec!["downstream_id", "routing_key", "upstream_id"]);
        assert_eq!(edge["routing_key"], json!("rows"));
        assert_eq!(edge["upstream_id"], json!(t1.id().to_string()));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = Flow::deserialize("{ not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
