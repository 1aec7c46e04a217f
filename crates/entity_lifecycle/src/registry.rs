//! In-memory mapping from catalog id to live entity handle.
//!
//! Derived state, rebuilt every server session by reconciliation and never
//! persisted. An entry only proves the handle was valid at insertion time;
//! the host can invalidate it at any moment, so reads re-validate.

use dashmap::{DashMap, DashSet};
use host_api::{EntityHandle, WorldHost, WorldId};
use tracing::debug;

#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: DashMap<String, EntityHandle>,
    /// Ids registered at least once this session. Guards the match phase
    /// against double-registration from duplicate scan passes.
    session: DashSet<String>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites; last write wins. Marks the id as seen this
    /// session.
    pub fn register(&self, id: &str, handle: EntityHandle) {
        self.handles.insert(id.to_string(), handle);
        self.session.insert(id.to_string());
    }

    /// Removes and returns the prior handle, if any.
    pub fn unregister(&self, id: &str) -> Option<EntityHandle> {
        self.handles.remove(id).map(|(_, handle)| handle)
    }

    /// The raw handle without a validity check.
    pub fn handle(&self, id: &str) -> Option<EntityHandle> {
        self.handles.get(id).map(|entry| *entry.value())
    }

    /// True iff a handle exists for `id` and is valid right now.
    pub fn is_spawned(&self, id: &str, host: &dyn WorldHost, world: &WorldId) -> bool {
        self.handle(id)
            .is_some_and(|handle| host.is_valid(world, handle))
    }

    /// Validated lookup that drops entries the host has invalidated behind
    /// our back.
    pub fn live_handle(
        &self,
        id: &str,
        host: &dyn WorldHost,
        world: &WorldId,
    ) -> Option<EntityHandle> {
        let handle = self.handle(id)?;
        if host.is_valid(world, handle) {
            Some(handle)
        } else {
            debug!("Dropping stale handle {} for record {}", handle, id);
            self.handles.remove(id);
            None
        }
    }

    pub fn seen_this_session(&self, id: &str) -> bool {
        self.session.contains(id)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.handles.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drops all entries and session tracking without despawning anything.
    /// Only for full teardown, when the host is removing the world anyway.
    pub fn clear(&self) {
        self.handles.clear();
        self.session.clear();
    }
}
