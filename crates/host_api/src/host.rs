//! The capability traits the host engine implements for plugins.

use crate::types::{EntityHandle, EntitySpec, Position, WorldId};

/// Entity-level operations a plugin may ask of the host.
///
/// Markers are plain data tags attached through the host's generic component
/// API: a `(tag, id)` pair, where `tag` names the plugin-defined marker kind
/// and `id` is the catalog id the entity represents. The host's own entity
/// persistence does not carry these tags across restarts, which is why
/// role-based scans ([`WorldHost::scan_role`]) exist at all.
pub trait WorldHost: Send + Sync {
    /// Ask the host to instantiate an entity. Returns `None` when the host
    /// refuses (unknown model, world shutting down, ...); there is no retry
    /// or error detail beyond that.
    fn spawn_entity(&self, world: &WorldId, spec: &EntitySpec) -> Option<EntityHandle>;

    /// Remove a live entity. Silently ignores stale handles.
    fn remove_entity(&self, world: &WorldId, handle: EntityHandle);

    /// Attach or overwrite a marker tag on a live entity.
    fn attach_marker(&self, world: &WorldId, handle: EntityHandle, tag: &str, id: &str);

    /// All live entities carrying a marker with the given tag, with the
    /// catalog id each marker holds.
    fn scan_marked(&self, world: &WorldId, tag: &str) -> Vec<(EntityHandle, String)>;

    /// All live entities running the given behaviour role, marked or not.
    fn scan_role(&self, world: &WorldId, role: &str) -> Vec<(EntityHandle, Position)>;

    /// The marker id under `tag` on this entity, if the entity is live and
    /// carries one.
    fn marker_of(&self, world: &WorldId, handle: EntityHandle, tag: &str) -> Option<String>;

    /// Current position of a live entity.
    fn position_of(&self, world: &WorldId, handle: EntityHandle) -> Option<Position>;

    /// Whether the handle still refers to a live entity. Validity can be
    /// revoked at any time by host-side removal, so callers re-check before
    /// every use rather than caching the answer.
    fn is_valid(&self, world: &WorldId, handle: EntityHandle) -> bool;
}

/// Hand-off onto the host's single world-processing thread.
///
/// All ECS access, spawning, and reconciliation must happen on that thread.
/// Command and UI handlers running elsewhere submit their work here instead
/// of touching [`WorldHost`] directly.
pub trait WorldDispatcher: Send + Sync {
    fn execute(&self, world: &WorldId, task: Box<dyn FnOnce() + Send>);
}
