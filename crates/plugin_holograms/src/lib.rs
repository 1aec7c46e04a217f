//! Holograms plugin: floating text entities, durably cataloged and spawned
//! into each chunk as it loads.
//!
//! A hologram is a near-invisible carrier model with a nameplate. The catalog
//! is the source of truth; live entities are reconciled against it on every
//! chunk load, and text updates go through despawn + respawn rather than
//! mutating a live entity.

pub mod config;

pub use config::{ConfigError, HologramConfig};

use async_trait::async_trait;
use entity_lifecycle::{
    short_record_id, CatalogRecord, CatalogStore, HandleRegistry, LifecycleResult, Reconciler,
    SpawnProfile, Spawner,
};
use host_api::{
    ChunkPos, ChunkReadyEvent, EntityKind, EntitySpec, Plugin, PluginContext, PluginError,
    PluginResult, Position, WorldHost, WorldId, WorldRemovedEvent,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Marker tag attached to every hologram carrier entity.
pub const MARKER_TAG: &str = "hologram";

/// A hologram's persistent data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HologramRecord {
    pub id: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CatalogRecord for HologramRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

struct HologramProfile {
    model_id: String,
}

impl SpawnProfile<HologramRecord> for HologramProfile {
    fn marker_tag(&self) -> &str {
        MARKER_TAG
    }

    fn spec_for(&self, record: &HologramRecord) -> EntitySpec {
        EntitySpec::new(EntityKind::Model(self.model_id.clone()), record.position())
            .with_nameplate(&record.text)
    }
}

/// Manages hologram creation, deletion, text updates, and persistence.
pub struct HologramManager {
    catalog: Arc<CatalogStore<HologramRecord>>,
    registry: Arc<HandleRegistry>,
    spawner: Arc<Spawner<HologramRecord>>,
    reconciler: Reconciler<HologramRecord>,
}

impl HologramManager {
    pub fn open(data_dir: &Path, config: &HologramConfig) -> Self {
        let catalog = Arc::new(CatalogStore::open(data_dir, &config.data_file));
        let registry = Arc::new(HandleRegistry::new());
        let spawner = Arc::new(Spawner::new(
            registry.clone(),
            Box::new(HologramProfile {
                model_id: config.model_id.clone(),
            }),
        ));
        let reconciler = Reconciler::new(catalog.clone(), registry.clone(), spawner.clone())
            .with_tolerance(config.position_tolerance);
        Self {
            catalog,
            registry,
            spawner,
            reconciler,
        }
    }

    /// Creates a new hologram, persists it, and spawns its entity. A spawn
    /// failure is logged and left to the next reconciliation pass; the record
    /// itself is durable either way.
    pub fn create(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        text: &str,
        position: Position,
    ) -> LifecycleResult<HologramRecord> {
        let record = HologramRecord {
            id: short_record_id(),
            text: text.to_string(),
            x: position.x,
            y: position.y,
            z: position.z,
        };
        self.catalog.insert(record.clone())?;
        info!("Created hologram {} at {}", record.id, position);
        if let Err(e) = self.spawner.spawn(host, world, &record) {
            warn!("Hologram {} not spawned yet: {}", record.id, e);
        }
        Ok(record)
    }

    /// Deletes a hologram and despawns its entity. Returns `false` when no
    /// such record exists.
    pub fn delete(&self, host: &dyn WorldHost, world: &WorldId, id: &str) -> LifecycleResult<bool> {
        if self.catalog.remove(id)?.is_none() {
            return Ok(false);
        }
        self.spawner.despawn(host, world, id);
        info!("Deleted hologram {}", id);
        Ok(true)
    }

    /// Updates a hologram's text: persists the change, then replaces the live
    /// entity (cached-handle fast path, marker-scan fallback).
    pub fn update_text(
        &self,
        host: &dyn WorldHost,
        world: &WorldId,
        id: &str,
        new_text: &str,
    ) -> LifecycleResult<bool> {
        if !self.catalog.update(id, |r| r.text = new_text.to_string())? {
            return Ok(false);
        }
        if let Some(record) = self.catalog.get(id) {
            if let Err(e) = self.spawner.refresh(host, world, &record) {
                warn!("Hologram {} text updated but respawn failed: {}", id, e);
            }
        }
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<HologramRecord> {
        self.catalog.get(id)
    }

    pub fn all(&self) -> Vec<HologramRecord> {
        self.catalog.all()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.catalog.contains(id)
    }

    pub fn is_spawned(&self, host: &dyn WorldHost, world: &WorldId, id: &str) -> bool {
        self.registry.is_spawned(id, host, world)
    }

    /// Reconciles holograms belonging to a freshly loaded chunk.
    pub fn reconcile_chunk(&self, host: &dyn WorldHost, world: &WorldId, chunk: ChunkPos) {
        self.reconciler.reconcile_chunk(host, world, chunk);
    }

    /// Despawns every hologram entity, e.g. when the world is removed.
    pub fn despawn_all(&self, host: &dyn WorldHost, world: &WorldId) {
        self.reconciler.despawn_all(host, world);
    }

    /// Drops handle bookkeeping without touching the world. Full shutdown
    /// only, when the host is tearing the world down anyway.
    pub fn forget_session(&self) {
        self.registry.clear();
    }
}

/// The loadable plugin wrapper around [`HologramManager`].
pub struct HologramsPlugin {
    manager: OnceLock<Arc<HologramManager>>,
}

impl HologramsPlugin {
    pub fn new() -> Self {
        Self {
            manager: OnceLock::new(),
        }
    }

    pub fn manager(&self) -> PluginResult<&Arc<HologramManager>> {
        self.manager
            .get()
            .ok_or_else(|| PluginError::RuntimeError("holograms plugin not initialized".into()))
    }
}

impl Default for HologramsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for HologramsPlugin {
    fn name(&self) -> &str {
        "holograms"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&mut self, context: Arc<PluginContext>) -> PluginResult<()> {
        let config_path = context.data_dir().join("holograms.toml");
        let config = HologramConfig::load(&config_path)
            .map_err(|e| PluginError::InitializationFailed(e.to_string()))?;
        config
            .validate()
            .map_err(PluginError::InitializationFailed)?;

        let manager = Arc::new(HologramManager::open(context.data_dir(), &config));
        info!(
            "Holograms plugin initialized with {} cataloged holograms",
            manager.all().len()
        );
        let _ = self.manager.set(manager);
        Ok(())
    }

    async fn shutdown(&mut self, _context: Arc<PluginContext>) -> PluginResult<()> {
        if let Some(manager) = self.manager.get() {
            manager.forget_session();
        }
        info!("Holograms plugin shut down");
        Ok(())
    }

    async fn on_chunk_ready(
        &self,
        context: Arc<PluginContext>,
        event: ChunkReadyEvent,
    ) -> PluginResult<()> {
        let manager = self.manager()?;
        manager.reconcile_chunk(context.host().as_ref(), &event.world, event.chunk);
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
    let plugin = Box::new(HologramsPlugin::new());
    Box::into_raw(plugin)
}

/// Destroy plugin instance - required export for dynamic loading.
#[no_mangle]
pub unsafe extern "C" fn destroy_plugin(plugin: *mut dyn Plugin) {
    if !plugin.is_null() {
        let _ = Box::from_raw(plugin);
    }
}
