//! Trader NPC plugin: interactable shop NPCs with durable records and trade
//! lists.
//!
//! Unlike holograms, trader NPCs run a host behaviour role, and the host's
//! own entity persistence recreates them across restarts - minus our marker
//! component. Reconciliation therefore scans by role as well as by marker,
//! matching markerless survivors to records by position and replacing them
//! with freshly tagged spawns.

pub mod config;

pub use config::{ConfigError, TraderConfig};

use async_trait::async_trait;
use entity_lifecycle::{
    short_record_id, CatalogRecord, CatalogResult, CatalogStore, HandleRegistry, LifecycleResult,
    Reconciler, SpawnProfile, Spawner,
};
use host_api::{
    EntityHandle, EntityKind, EntitySpec, Plugin, PluginContext, PluginError, PluginResult,
    Position, WorldAddedEvent, WorldHost, WorldId, WorldRemovedEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Marker tag attached to every trader NPC entity.
pub const MARKER_TAG: &str = "trader_npc";

/// A single trade an NPC offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub input_item_id: String,
    pub input_quantity: u32,
    pub output_item_id: String,
    pub output_quantity: u32,
}

/// A trader NPC's persistent data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderRecord {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub trades: Vec<TradeEntry>,
}

impl CatalogRecord for TraderRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

struct TraderProfile {
    role: String,
}

impl SpawnProfile<TraderRecord> for TraderProfile {
    fn marker_tag(&self) -> &str {
        MARKER_TAG
    }

    fn spec_for(&self, record: &TraderRecord) -> EntitySpec {
        EntitySpec::new(EntityKind::Role(self.role.clone()), record.position())
            .with_nameplate(&record.name)
    }

    fn role(&self) -> Option<&str> {
        Some(&self.role)
    }
}

/// Manages trader NPC creation, deletion, trades, persistence, and entity
/// recovery.
pub struct TraderManager {
    catalog: Arc<CatalogStore<TraderRecord>>,
    registry: Arc<HandleRegistry>,
    spawner: Arc<Spawner<TraderRecord>>,
    reconciler: Reconciler<TraderRecord>,
    role: String,
    tolerance: f64,
}

impl TraderManager {
    pub fn open(data_dir: &Path, config: &TraderConfig) -> Self {
        let catalog = Arc::new(CatalogStore::open(data_dir, &config.data_file));
        let registry = Arc::new(HandleRegistry::new());
        let spawner = Arc::new(Spawner::new(
            registry.clone(),
            Box::new(TraderProfile {
                role: config.role.clone(),
            }),
        ));
        let reconciler = Reconciler::new(catalog.clone(), registry.clone(), spawner.clone())
            .with_tolerance(config.position_tolerance);
        Self {
            catalog,
            registry,
            spawner,
            reconciler,
            role: config.role.clone(),
            tolerance: config.position_tolerance,
        }
    }

    /// Creates a new trader NPC with an empty trade list, persists it, and
    /// spawns its entity.
    pub fn create(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        name: &str,
        position: Position,
    ) -> LifecycleResult<TraderRecord> {
        let record = TraderRecord {
            id: short_record_id(),
            name: name.to_string(),
            x: position.x,
            y: position.y,
            z: position.z,
            trades: Vec::new(),
        };
        self.catalog.insert(record.clone())?;
        info!("Created trader NPC {} '{}' at {}", record.id, name, position);
        if let Err(e) = self.spawner.spawn(host, world, &record) {
            warn!("Trader NPC {} not spawned yet: {}", record.id, e);
        }
        Ok(record)
    }

    /// Deletes a trader NPC and despawns its entity.
    pub fn delete(&self, host: &dyn WorldHost, world: &WorldId, id: &str) -> LifecycleResult<bool> {
        if self.catalog.remove(id)?.is_none() {
            return Ok(false);
        }
        self.spawner.despawn(host, world, id);
        info!("Deleted trader NPC {}", id);
        Ok(true)
    }

    /// Removes every trader entity in the world - marked or merely running
    /// our role - clears all records and bookkeeping, and saves the empty
    /// state. Returns how many entities were removed.
    pub fn clear_all(&self, host: &dyn WorldHost, world: &WorldId) -> LifecycleResult<usize> {
        let mut doomed: HashSet<EntityHandle> = HashSet::new();
        for (handle, _) in host.scan_marked(world, MARKER_TAG) {
            doomed.insert(handle);
        }
        for (handle, _) in host.scan_role(world, &self.role) {
            doomed.insert(handle);
        }
        for handle in &doomed {
            host.remove_entity(world, *handle);
        }
        self.registry.clear();
        self.catalog.clear()?;
        info!("Cleared all trader NPCs (removed {} entities)", doomed.len());
        Ok(doomed.len())
    }

    /// Appends a trade to an NPC's list.
    pub fn add_trade(&self, id: &str, trade: TradeEntry) -> CatalogResult<bool> {
        self.catalog.update(id, |r| r.trades.push(trade))
    }

    /// Removes the trade at `index`. Returns `false` for unknown ids or
    /// out-of-range indices.
    pub fn remove_trade(&self, id: &str, index: usize) -> CatalogResult<bool> {
        let Some(record) = self.catalog.get(id) else {
            return Ok(false);
        };
        if index >= record.trades.len() {
            return Ok(false);
        }
        self.catalog.update(id, |r| {
            if index < r.trades.len() {
                r.trades.remove(index);
            }
        })
    }

    /// Replaces the trade at `index`.
    pub fn update_trade(&self, id: &str, index: usize, trade: TradeEntry) -> CatalogResult<bool> {
        let Some(record) = self.catalog.get(id) else {
            return Ok(false);
        };
        if index >= record.trades.len() {
            return Ok(false);
        }
        self.catalog.update(id, |r| {
            if index < r.trades.len() {
                r.trades[index] = trade;
            }
        })
    }

    /// Nearest record within per-axis tolerance of `position`, if any.
    pub fn find_by_position(&self, position: Position) -> Option<TraderRecord> {
        self.catalog
            .all()
            .into_iter()
            .filter(|r| r.position().within(position, self.tolerance))
            .min_by(|a, b| {
                a.position()
                    .distance_sq(position)
                    .total_cmp(&b.position().distance_sq(position))
            })
    }

    /// Resolves a live entity back to its record via its marker. Used by
    /// interaction handlers that only have the entity the player clicked.
    pub fn by_handle(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        handle: EntityHandle,
    ) -> Option<TraderRecord> {
        let id = host.marker_of(world, handle, MARKER_TAG)?;
        self.catalog.get(&id)
    }

    pub fn get(&self, id: &str) -> Option<TraderRecord> {
        self.catalog.get(id)
    }

    pub fn all(&self) -> Vec<TraderRecord> {
        self.catalog.all()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.catalog.contains(id)
    }

    pub fn is_spawned(&self, host: &dyn WorldHost, world: &WorldId, id: &str) -> bool {
        self.registry.is_spawned(id, host, world)
    }

    /// Recovers or spawns every NPC for a freshly added world: recovers
    /// handles for marked survivors, re-tags markerless ones the host
    /// persisted, removes orphans, and spawns whatever is missing.
    pub fn reconcile(&self, host: &dyn WorldHost, world: &WorldId) {
        self.reconciler.reconcile(host, world);
    }

    pub fn despawn_all(&self, host: &dyn WorldHost, world: &WorldId) {
        self.reconciler.despawn_all(host, world);
    }

    pub fn forget_session(&self) {
        self.registry.clear();
    }

    /// Hands a creation request off to the host's world-processing thread.
    /// Command and UI handlers run elsewhere and must not touch the world
    /// directly.
    pub fn schedule_create(
        self: &Arc<Self>,
        context: &PluginContext,
        world: &WorldId,
        name: String,
        position: Position,
    ) {
        let manager = Arc::clone(self);
        let host = Arc::clone(context.host());
        let world = world.clone();
        context.dispatcher().execute(
            &world.clone(),
            Box::new(move || {
                if let Err(e) = manager.create(host.as_ref(), &world, &name, position) {
                    warn!("Scheduled trader creation failed: {}", e);
                }
            }),
        );
    }
}

/// The loadable plugin wrapper around [`TraderManager`].
pub struct TraderNpcsPlugin {
    manager: OnceLock<Arc<TraderManager>>,
}

impl TraderNpcsPlugin {
    pub fn new() -> Self {
        Self {
            manager: OnceLock::new(),
        }
    }

    pub fn manager(&self) -> PluginResult<&Arc<TraderManager>> {
        self.manager
            .get()
            .ok_or_else(|| PluginError::RuntimeError("trader plugin not initialized".into()))
    }
}

impl Default for TraderNpcsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for TraderNpcsPlugin {
    fn name(&self) -> &str {
        "trader_npcs"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&mut self, context: Arc<PluginContext>) -> PluginResult<()> {
        let config_path = context.data_dir().join("trader_npcs.toml");
        let config = TraderConfig::load(&config_path)
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;
        config
            .validate()
            .map_err(PluginError::InitializationFailed)?;

        let manager = Arc::new(TraderManager::open(context.data_dir(), &config));
        info!(
            "Trader NPC plugin initialized with {} cataloged NPCs",
            manager.all().len()
        );
        let _ = self.manager.set(manager);
        Ok(())
    }

    async fn shutdown(&mut self, _context: Arc<PluginContext>) -> PluginResult<()> {
        if let Some(manager) = self.manager.get() {
            manager.forget_session();
        }
        info!("Trader NPC plugin shut down");
        Ok(())
    }

    async fn on_world_added(
        &self,
        context: Arc<PluginContext>,
        event: WorldAddedEvent,
    ) -> PluginResult<()> {
        let manager = self.manager()?;
        manager.reconcile(context.host().as_ref(), &event.world);
        Ok(())
    }

    async fn on_world_removed(
        &self,
        context: Arc<PluginContext>,
        event: WorldRemovedEvent,
    ) -> PluginResult<()> {
        let manager = self.manager()?;
        manager.despawn_all(context.host().as_ref(), &event.world);
        Ok(())
    }
}

/// Create plugin instance - required export for dynamic loading.
#[no_mangle]
pub unsafe extern "C" fn create_plugin() -> *mut dyn Plugin {
    let plugin = Box::new(TraderNpcsPlugin::new());
    Box::into_raw(plugin)
}

/// Destroy plugin instance - required export for dynamic loading.
#[no_mangle]
pub unsafe extern "C" fn destroy_plugin(plugin: *mut dyn Plugin) {
    if !plugin.is_null() {
        let _ = Box::from_raw(plugin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_api::{MemoryWorldHost, WorldDispatcher};
    use tempfile::tempdir;

    fn trade(input: &str, output: &str) -> TradeEntry {
        TradeEntry {
            input_item_id: input.to_string(),
            input_quantity: 1,
            output_item_id: output.to_string(),
            output_quantity: 1,
        }
    }

    fn setup() -> (MemoryWorldHost, WorldId, TraderManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let manager = TraderManager::open(dir.path(), &TraderConfig::default());
        (
            MemoryWorldHost::new(),
            WorldId::new("overworld"),
            manager,
            dir,
        )
    }

    #[test]
    fn create_spawns_a_role_entity_with_marker() {
        let (host, world, manager, _dir) = setup();
        let record = manager
            .create(&host, &world, "Bartleby", Position::new(5.0, 64.0, 5.0))
            .unwrap();

        assert!(manager.is_spawned(&host, &world, &record.id));
        let scanned = host.scan_role(&world, "waypost_trader");
        assert_eq!(scanned.len(), 1);
        assert_eq!(
            host.marker_of(&world, scanned[0].0, MARKER_TAG).as_deref(),
            Some(record.id.as_str())
        );
    }

    #[test]
    fn trades_persist_across_reopen() {
        let (_host, _world, manager, dir) = setup();
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");
        let record = manager
            .create(&host, &world, "Bartleby", Position::new(5.0, 64.0, 5.0))
            .unwrap();

        assert!(manager.add_trade(&record.id, trade("coal", "torch")).unwrap());
        assert!(manager.add_trade(&record.id, trade("iron", "sword")).unwrap());
        assert!(manager
            .update_trade(&record.id, 1, trade("iron", "shield"))
            .unwrap());
        assert!(manager.remove_trade(&record.id, 0).unwrap());

        // Out-of-range and unknown-id variants are refusals, not errors.
        assert!(!manager.remove_trade(&record.id, 5).unwrap());
        assert!(!manager.add_trade("nope", trade("a", "b")).unwrap());

        let reopened = TraderManager::open(dir.path(), &TraderConfig::default());
        let trades = reopened.get(&record.id).unwrap().trades;
        assert_eq!(trades, vec![trade("iron", "shield")]);
    }

    #[test]
    fn world_add_reconciles_marked_and_markerless_survivors() {
        let (host, world, manager, dir) = setup();
        let kept = manager
            .create(&host, &world, "Kept", Position::new(5.0, 64.0, 5.0))
            .unwrap();
        let lost = manager
            .create(&host, &world, "Lost", Position::new(50.0, 64.0, 50.0))
            .unwrap();

        // Restart: entities survive via host persistence, one loses its
        // marker; registry state is gone.
        let kept_handle = manager.registry.handle(&kept.id).unwrap();
        host.strip_markers(&world, MARKER_TAG);
        host.attach_marker(&world, kept_handle, MARKER_TAG, &kept.id);
        let manager = TraderManager::open(dir.path(), &TraderConfig::default());

        manager.reconcile(&host, &world);

        // The marked survivor was recovered in place; the markerless one was
        // replaced with a fresh tagged spawn. No duplicates either way.
        assert_eq!(host.live_count(&world), 2);
        assert_eq!(manager.registry.handle(&kept.id), Some(kept_handle));
        let lost_handle = manager.registry.handle(&lost.id).unwrap();
        assert_eq!(
            host.marker_of(&world, lost_handle, MARKER_TAG).as_deref(),
            Some(lost.id.as_str())
        );
    }

    #[test]
    fn clear_all_removes_marked_and_roled_entities() {
        let (host, world, manager, _dir) = setup();
        manager
            .create(&host, &world, "A", Position::new(5.0, 64.0, 5.0))
            .unwrap();
        manager
            .create(&host, &world, "B", Position::new(15.0, 64.0, 15.0))
            .unwrap();
        // A stray markerless entity from earlier testing, same role.
        host.spawn_entity(
            &world,
            &EntitySpec::new(
                EntityKind::Role("waypost_trader".into()),
                Position::new(99.0, 64.0, 99.0),
            ),
        )
        .unwrap();

        let removed = manager.clear_all(&host, &world).unwrap();

        assert_eq!(removed, 3);
        assert_eq!(host.live_count(&world), 0);
        assert!(manager.all().is_empty());
        assert!(manager.registry.is_empty());
    }

    #[test]
    fn find_by_position_prefers_the_nearest_record() {
        let (host, world, manager, _dir) = setup();
        let near = manager
            .create(&host, &world, "Near", Position::new(10.2, 64.0, 10.0))
            .unwrap();
        manager
            .create(&host, &world, "Far", Position::new(10.9, 64.0, 10.0))
            .unwrap();

        let found = manager
            .find_by_position(Position::new(10.0, 64.0, 10.0))
            .unwrap();
        assert_eq!(found.id, near.id);
        assert!(manager
            .find_by_position(Position::new(200.0, 64.0, 200.0))
            .is_none());
    }

    #[test]
    fn by_handle_resolves_the_clicked_entity() {
        let (host, world, manager, _dir) = setup();
        let record = manager
            .create(&host, &world, "Bartleby", Position::new(5.0, 64.0, 5.0))
            .unwrap();
        let handle = manager.registry.handle(&record.id).unwrap();

        let resolved = manager.by_handle(&host, &world, handle).unwrap();
        assert_eq!(resolved.id, record.id);

        host.remove_entity_externally(&world, handle);
        assert!(manager.by_handle(&host, &world, handle).is_none());
    }

    #[test]
    fn schedule_create_runs_on_the_world_thread() {
        let dir = tempdir().unwrap();
        let host = Arc::new(MemoryWorldHost::new());
        let dispatcher: Arc<dyn WorldDispatcher> = host.clone();
        let context = PluginContext::new(host.clone(), dispatcher, dir.path());
        let world = WorldId::new("overworld");

        let manager = Arc::new(TraderManager::open(dir.path(), &TraderConfig::default()));
        manager.schedule_create(
            &context,
            &world,
            "Bartleby".to_string(),
            Position::new(5.0, 64.0, 5.0),
        );

        // The memory host dispatches inline, so the NPC exists already.
        assert_eq!(manager.all().len(), 1);
        assert_eq!(host.live_count(&world), 1);
    }

    #[tokio::test]
    async fn plugin_lifecycle_drives_the_manager() {
        let dir = tempdir().unwrap();
        let host = Arc::new(MemoryWorldHost::new());
        let dispatcher: Arc<dyn WorldDispatcher> = host.clone();
        let context = Arc::new(PluginContext::new(host.clone(), dispatcher, dir.path()));
        let world = WorldId::new("overworld");

        // Seed a catalog from a previous session.
        {
            let manager = TraderManager::open(dir.path(), &TraderConfig::default());
            let host = MemoryWorldHost::new();
            manager
                .create(&host, &world, "Bartleby", Position::new(5.0, 64.0, 5.0))
                .unwrap();
        }

        let mut plugin = TraderNpcsPlugin::new();
        assert_eq!(plugin.name(), "trader_npcs");
        plugin.init(context.clone()).await.unwrap();

        plugin
            .on_world_added(context.clone(), WorldAddedEvent::now(world.clone()))
            .await
            .unwrap();
        assert_eq!(host.live_count(&world), 1);

        plugin
            .on_world_removed(context.clone(), WorldRemovedEvent::now(world.clone()))
            .await
            .unwrap();
        assert_eq!(host.live_count(&world), 0);

        plugin.shutdown(context).await.unwrap();
    }
}
