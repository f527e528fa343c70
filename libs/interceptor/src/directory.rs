//! Service Directory
//!
//! Bidirectional id ↔ name map for the services on the bus, plus the set of
//! ids seen in traffic. Shared by every worker behind one `RwLock`, so a
//! registration is visible to both lookups at once.

use crate::config::ServiceEntry;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct DirectoryState {
    by_id: HashMap<u16, String>,
    by_name: HashMap<String, u16>,
    observed: BTreeSet<u16>,
}

/// Shared service id/name registry
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    state: RwLock<DirectoryState>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with `entries`
    pub fn with_services<'a>(entries: impl IntoIterator<Item = &'a ServiceEntry>) -> Self {
        let directory = Self::new();
        for entry in entries {
            directory.register(entry.id, &entry.name);
        }
        directory
    }

    /// Bind `name` to `id`, replacing any earlier binding of either
    pub fn register(&self, id: u16, name: &str) {
        let mut state = self.state.write();

        if let Some(old_name) = state.by_id.insert(id, name.to_string()) {
            if old_name != name {
                debug!(id, old = %old_name, new = name, "Service renamed");
                state.by_name.remove(&old_name);
            }
        }
        if let Some(old_id) = state.by_name.insert(name.to_string(), id) {
            if old_id != id {
                warn!(name, old_id, new_id = id, "Service name moved to a new id");
                state.by_id.remove(&old_id);
            }
        }
    }

    pub fn resolve_name(&self, name: &str) -> Option<u16> {
        self.state.read().by_name.get(name).copied()
    }

    pub fn resolve_id(&self, id: u16) -> Option<String> {
        self.state.read().by_id.get(&id).cloned()
    }

    /// Registered name, or `Unknown-<id>` for unnamed ids
    pub fn label(&self, id: u16) -> String {
        self.resolve_id(id)
            .unwrap_or_else(|| format!("Unknown-{}", id))
    }

    /// Record ids seen in traffic
    pub fn observe(&self, source: u16, target: u16) {
        let mut state = self.state.write();
        state.observed.insert(source);
        state.observed.insert(target);
    }

    /// Every id seen in traffic so far, ascending
    pub fn observed_ids(&self) -> Vec<u16> {
        self.state.read().observed.iter().copied().collect()
    }

    /// Registered services, ordered by id
    pub fn entries(&self) -> Vec<ServiceEntry> {
        let state = self.state.read();
        let mut entries: Vec<_> = state
            .by_id
            .iter()
            .map(|(id, name)| ServiceEntry::new(*id, name.clone()))
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
