//! Store Module - flow persistence
//!
//! A store keeps serialized flows keyed by [`FlowId`]. The id is assigned
//! on the first successful save and reused by every later save.
//!
//! Key types:
//! - `FlowStore`: save/load contract
//! - `MemoryStore`: DashMap-backed, for tests and embedding
//! - `FileStore`: one `<id>.json` file per flow in a directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::dag::{Flow, FlowId};
use crate::error::{FlowError, Result};

/// Persistence backend for flows
pub trait FlowStore: Send + Sync {
    /// Persist `flow`, assigning its id on first save
    fn save(&self, flow: &Flow) -> Result<FlowId>;

    /// Rebuild a stored flow; `FlowNotFound` if the id is unknown
    fn load(&self, id: FlowId) -> Result<Flow>;

    fn contains(&self, id: FlowId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialize `flow` under its existing id or a fresh one
///
/// The id is only written into the document here; callers commit it to the
/// flow with `assign_id` after the write succeeded. When a concurrent save
/// committed a different id first, the caller discards its own copy.
pub(crate) fn encode(flow: &Flow) -> Result<(FlowId, String)> {
    let id = flow.id().unwrap_or_default();
    let mut doc = flow.to_document()?;
    doc.id = Some(id.to_string());
    Ok((id, serde_json::to_string_pretty(&doc)?))
}

/// Decode a stored document, filling in the id when the document lacks it
///
/// A document carrying another flow's id is rejected.
pub(crate) fn decode(id: FlowId, json: &str) -> Result<Flow> {
    let flow = Flow::deserialize(json)?;
    match flow.id() {
        Some(found) if found != id => Err(FlowError::invalid_document(format!(
            "document id '{found}' does not match store key '{id}'"
        ))),
        _ => {
            flow.assign_id(id);
            Ok(flow)
        }
    }
}
