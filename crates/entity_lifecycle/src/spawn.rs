//! Spawn/despawn orchestration: creating and destroying the live
//! representation of catalog records.

use crate::catalog::CatalogRecord;
use crate::error::{SpawnError, SpawnResult};
use crate::registry::HandleRegistry;
use host_api::{EntityHandle, EntitySpec, WorldHost, WorldId};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// How records of one kind become live entities.
pub trait SpawnProfile<R: CatalogRecord>: Send + Sync {
    /// Marker tag attached to every entity this profile spawns.
    fn marker_tag(&self) -> &str;

    /// The spawn request for a record.
    fn spec_for(&self, record: &R) -> EntitySpec;

    /// Host behaviour role of the spawned entities, when they have one.
    /// Role-backed entities are persisted by the host itself and need
    /// role-scan recovery after restarts; model-backed kinds return `None`.
    fn role(&self) -> Option<&str> {
        None
    }
}

/// Creates and destroys live entities for catalog records, keeping the
/// registry in step.
pub struct Spawner<R> {
    registry: Arc<HandleRegistry>,
    profile: Box<dyn SpawnProfile<R>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: CatalogRecord> Spawner<R> {
    pub fn new(registry: Arc<HandleRegistry>, profile: Box<dyn SpawnProfile<R>>) -> Self {
        Self {
            registry,
            profile,
            _record: PhantomData,
        }
    }

    pub fn marker_tag(&self) -> &str {
        self.profile.marker_tag()
    }

    pub fn role(&self) -> Option<&str> {
        self.profile.role()
    }

    /// Instantiates the record's entity, attaches its marker, and registers
    /// the handle. A host refusal leaves the record unspawned with no retry;
    /// the next reconciliation pass will attempt again.
    pub fn spawn(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        record: &R,
    ) -> SpawnResult<EntityHandle> {
        let spec = self.profile.spec_for(record);
        let Some(handle) = host.spawn_entity(world, &spec) else {
            return Err(SpawnError::HostRejected {
                id: record.id().to_string(),
            });
        };
        host.attach_marker(world, handle, self.profile.marker_tag(), record.id());
        self.registry.register(record.id(), handle);
        info!(
            "Spawned entity {} for record {} at {}",
            handle,
            record.id(),
            record.position()
        );
        Ok(handle)
    }

    /// Unregisters the handle and removes the underlying entity. No-op when
    /// nothing is registered or the handle already went stale.
    pub fn despawn(&self, host: &dyn WorldHost, world: &WorldId, id: &str) -> bool {
        let Some(handle) = self.registry.unregister(id) else {
            return false;
        };
        if host.is_valid(world, handle) {
            host.remove_entity(world, handle);
            debug!("Despawned entity {} for record {}", handle, id);
            return true;
        }
        false
    }

    /// Removes an untagged orphan by raw handle and spawns a fresh tagged
    /// replacement from the record.
    pub fn replace(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        orphan: EntityHandle,
        record: &R,
    ) -> SpawnResult<EntityHandle> {
        if host.is_valid(world, orphan) {
            host.remove_entity(world, orphan);
        }
        self.spawn(host, world, record)
    }

    /// The update mechanism: despawn whatever currently represents the record
    /// and respawn from its (already persisted) state. Uses the cached handle
    /// when still valid; falls back to a marker scan for stale or missing
    /// handles. There is no in-place mutation of a live entity's display data.
    pub fn refresh(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        record: &R,
    ) -> SpawnResult<EntityHandle> {
        let id = record.id();
        match self.registry.unregister(id) {
            Some(handle) if host.is_valid(world, handle) => {
                debug!("Refresh of record {}: fast path, cached handle valid", id);
                host.remove_entity(world, handle);
            }
            _ => {
                debug!("Refresh of record {}: marker-scan fallback", id);
                self.remove_by_marker(host, world, id);
            }
        }
        self.spawn(host, world, record)
    }

    /// Removes every live entity whose marker names `id`. Fallback for when
    /// cached handles are invalid.
    fn remove_by_marker(&self, host: &dyn WorldHost, world: &WorldId, id: &str) {
        for (handle, marker_id) in host.scan_marked(world, self.profile.marker_tag()) {
            if marker_id == id {
                host.remove_entity(world, handle);
            }
        }
    }
}
