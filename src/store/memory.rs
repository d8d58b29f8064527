//! MemoryStore - serialized flows in a DashMap

use dashmap::DashMap;
use tracing::{debug, instrument};

use super::{decode, encode, FlowStore};
use crate::dag::{Flow, FlowId};
use crate::error::{FlowError, Result};

/// In-process store
///
/// Flows are kept as JSON so a load always yields an independent copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flows: DashMap<FlowId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every stored flow (unordered)
    pub fn ids(&self) -> Vec<FlowId> {
        self.flows.iter().map(|entry| *entry.key()).collect()
    }
}

impl FlowStore for MemoryStore {
    #[instrument(skip(self, flow), fields(flow = %flow.name()))]
    fn save(&self, flow: &Flow) -> Result<FlowId> {
        let (id, json) = encode(flow)?;
        self.flows.insert(id, json);

        let assigned = flow.assign_id(id);
        if assigned != id {
            // lost the race for the first id
            self.flows.remove(&id);
        }
        debug!(id = %assigned, "Saved flow");
        Ok(assigned)
    }

    #[instrument(skip(self))]
    fn load(&self, id: FlowId) -> Result<Flow> {
        // clone out so the shard lock is released before decoding
        let json = self
            .flows
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FlowError::FlowNotFound { id: id.to_string() })?;
        decode(id, &json)
    }

    fn contains(&self, id: FlowId) -> bool {
        self.flows.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.flows.len()
    }
}
