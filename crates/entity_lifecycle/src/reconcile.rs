//! Aligns live-world entities with catalog records.
//!
//! Runs on the host's world-processing thread when a world or chunk becomes
//! available. Three phases: scan live entities for markers, match them to
//! catalog records (removing orphans and re-tagging entities the host's own
//! persistence resurrected without markers), then fill in whatever is still
//! missing. Every catalog record ends up live or with a logged spawn failure.

use crate::catalog::{CatalogRecord, CatalogStore};
use crate::registry::HandleRegistry;
use crate::spawn::Spawner;
use host_api::{ChunkPos, EntityHandle, Position, WorldHost, WorldId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default per-axis tolerance for matching untagged entities to records.
pub const DEFAULT_POSITION_TOLERANCE: f64 = 1.0;

pub struct Reconciler<R> {
    catalog: Arc<CatalogStore<R>>,
    registry: Arc<HandleRegistry>,
    spawner: Arc<Spawner<R>>,
    tolerance: f64,
}

impl<R: CatalogRecord> Reconciler<R> {
    pub fn new(
        catalog: Arc<CatalogStore<R>>,
        registry: Arc<HandleRegistry>,
        spawner: Arc<Spawner<R>>,
    ) -> Self {
        Self {
            catalog,
            registry,
            spawner,
            tolerance: DEFAULT_POSITION_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Full world reconciliation. Fired once per world per session.
    pub fn reconcile(&self, host: &dyn WorldHost, world: &WorldId) {
        self.match_marked(host, world);
        if let Some(role) = self.spawner.role() {
            self.match_role(host, world, role);
        }
        self.fill(host, world, None);
    }

    /// Chunk-scoped reconciliation for kinds spawned as their chunks load.
    /// The marker scan still covers the whole world (orphan cleanup is cheap
    /// and idempotent); only the fill phase is restricted to the chunk.
    pub fn reconcile_chunk(&self, host: &dyn WorldHost, world: &WorldId, chunk: ChunkPos) {
        self.match_marked(host, world);
        self.fill(host, world, Some(chunk));
    }

    /// Scan + match over marker-tagged entities: recover handles for records
    /// still in the catalog, despawn entities whose record was deleted.
    fn match_marked(&self, host: &dyn WorldHost, world: &WorldId) {
        let marked = host.scan_marked(world, self.spawner.marker_tag());
        debug!(
            "Reconciling {}: {} marked entities in world",
            self.spawner.marker_tag(),
            marked.len()
        );
        for (handle, id) in marked {
            if self.catalog.contains(&id) {
                // Idempotent: a duplicate scan pass must not register twice.
                if self.registry.seen_this_session(&id) {
                    continue;
                }
                info!("Recovered existing entity {} for record {}", handle, id);
                self.registry.register(&id, handle);
            } else {
                info!("Removing orphaned entity {} (record {} deleted)", handle, id);
                self.registry.unregister(&id);
                host.remove_entity(world, handle);
            }
        }
    }

    /// Match untagged role entities (the host's persistence recreates them
    /// without plugin markers) to unclaimed records by position, and replace
    /// each with a freshly tagged spawn. Unmatched strangers are left alone.
    fn match_role(&self, host: &dyn WorldHost, world: &WorldId, role: &str) {
        let mut claimed: HashSet<String> = HashSet::new();
        let mut replacements: Vec<(EntityHandle, R)> = Vec::new();

        for (handle, position) in host.scan_role(world, role) {
            if host
                .marker_of(world, handle, self.spawner.marker_tag())
                .is_some()
            {
                // Properly tagged; match_marked already recovered it.
                continue;
            }
            match self.nearest_unclaimed(host, world, position, &claimed) {
                Some(record) => {
                    claimed.insert(record.id().to_string());
                    replacements.push((handle, record));
                }
                None => {
                    debug!(
                        "Untagged {} entity {} at {} matches no record; leaving it",
                        role, handle, position
                    );
                }
            }
        }

        for (orphan, record) in replacements {
            info!(
                "Replacing untagged persisted entity {} with fresh spawn for record {}",
                orphan,
                record.id()
            );
            if let Err(e) = self.spawner.replace(host, world, orphan, &record) {
                warn!("Replacement spawn failed: {}", e);
            }
        }
    }

    /// Nearest catalog record within tolerance that has no live handle and
    /// was not already claimed in this pass. Nearest-by-distance is the
    /// explicit tie-break when several records fall within tolerance. The
    /// handle check goes through `live_handle` so a stale registry entry
    /// cannot hide its record from matching.
    fn nearest_unclaimed(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        position: Position,
        claimed: &HashSet<String>,
    ) -> Option<R> {
        self.catalog
            .all()
            .into_iter()
            .filter(|r| {
                !claimed.contains(r.id())
                    && self.registry.live_handle(r.id(), host, world).is_none()
            })
            .filter(|r| r.position().within(position, self.tolerance))
            .min_by(|a, b| {
                a.position()
                    .distance_sq(position)
                    .total_cmp(&b.position().distance_sq(position))
            })
    }

    /// Spawn every record that still has no live handle. A failure is logged
    /// and the record stays unspawned until the next pass; nothing is
    /// silently skipped.
    fn fill(&self, host: &dyn WorldHost, world: &WorldId, chunk: Option<ChunkPos>) {
        for record in self.catalog.all() {
            if let Some(chunk) = chunk {
                if record.position().chunk() != chunk {
                    continue;
                }
            }
            if self
                .registry
                .live_handle(record.id(), host, world)
                .is_some()
            {
                continue;
            }
            if let Err(e) = self.spawner.spawn(host, world, &record) {
                warn!("Fill spawn failed, record stays unspawned until next pass: {}", e);
            }
        }
    }

    /// World teardown: despawn every registered entity that is still valid
    /// and reset the registry including session tracking.
    pub fn despawn_all(&self, host: &dyn WorldHost, world: &WorldId) {
        for id in self.registry.registered_ids() {
            if let Some(handle) = self.registry.unregister(&id) {
                if host.is_valid(world, handle) {
                    host.remove_entity(world, handle);
                }
            }
        }
        self.registry.clear();
    }
}
