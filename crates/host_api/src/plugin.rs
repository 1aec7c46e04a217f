//! The contract a loadable plugin implements against the host.

use crate::events::{
    ChunkReadyEvent, PlayerDisconnectedEvent, PlayerReadyEvent, WorldAddedEvent,
    WorldRemovedEvent,
};
use crate::host::{WorldDispatcher, WorldHost};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Plugin initialization and runtime errors.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Capabilities handed to a plugin when it is loaded.
pub struct PluginContext {
    host: Arc<dyn WorldHost>,
    dispatcher: Arc<dyn WorldDispatcher>,
    data_dir: PathBuf,
}

impl PluginContext {
    pub fn new(
        host: Arc<dyn WorldHost>,
        dispatcher: Arc<dyn WorldDispatcher>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            dispatcher,
            data_dir: data_dir.into(),
        }
    }

    pub fn host(&self) -> &Arc<dyn WorldHost> {
        &self.host
    }

    pub fn dispatcher(&self) -> &Arc<dyn WorldDispatcher> {
        &self.dispatcher
    }

    /// Directory the host reserves for this plugin's files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// A host-loadable plugin.
///
/// Lifecycle hooks and event hooks are invoked by the host; everything that
/// touches live entities runs on the host's world-processing thread. Event
/// hooks default to no-ops so plugins only implement what they react to.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    async fn init(&mut self, context: Arc<PluginContext>) -> PluginResult<()>;

    async fn shutdown(&mut self, context: Arc<PluginContext>) -> PluginResult<()>;

    async fn on_world_added(
        &self,
        _context: Arc<PluginContext>,
        _event: WorldAddedEvent,
    ) -> PluginResult<()> {
        Ok(())
    }

    async fn on_world_removed(
        &self,
        _context: Arc<PluginContext>,
        _event: WorldRemovedEvent,
    ) -> PluginResult<()> {
        Ok(())
    }

    async fn on_chunk_ready(
        &self,
        _context: Arc<PluginContext>,
        _event: ChunkReadyEvent,
    ) -> PluginResult<()> {
        Ok(())
    }

    async fn on_player_ready(
        &self,
        _context: Arc<PluginContext>,
        _event: PlayerReadyEvent,
    ) -> PluginResult<()> {
        Ok(())
    }

    async fn on_player_disconnected(
        &self,
        _context: Arc<PluginContext>,
        _event: PlayerDisconnectedEvent,
    ) -> PluginResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{WorldAddedEvent, WorldRemovedEvent};
    use crate::host::WorldDispatcher;
    use crate::memory::MemoryWorldHost;
    use crate::types::WorldId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPlugin {
        initialized: bool,
        worlds_seen: AtomicUsize,
        fail_shutdown: bool,
    }

    impl CountingPlugin {
        fn new(fail_shutdown: bool) -> Self {
            Self {
                initialized: false,
                worlds_seen: AtomicUsize::new(0),
                fail_shutdown,
            }
        }
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            "counting"
        }

        fn version(&self) -> &str {
            "0.0.0"
        }

        async fn init(&mut self, _context: Arc<PluginContext>) -> PluginResult<()> {
            self.initialized = true;
            Ok(())
        }

        async fn shutdown(&mut self, _context: Arc<PluginContext>) -> PluginResult<()> {
            if self.fail_shutdown {
                return Err(PluginError::ShutdownFailed("catalog still dirty".into()));
            }
            Ok(())
        }

        async fn on_world_added(
            &self,
            _context: Arc<PluginContext>,
            _event: WorldAddedEvent,
        ) -> PluginResult<()> {
            self.worlds_seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn context() -> Arc<PluginContext> {
        let host = Arc::new(MemoryWorldHost::new());
        let dispatcher: Arc<dyn WorldDispatcher> = host.clone();
        Arc::new(PluginContext::new(host, dispatcher, std::env::temp_dir()))
    }

    #[tokio::test]
    async fn implemented_hooks_run_and_the_rest_default_to_no_ops() {
        let mut plugin = CountingPlugin::new(false);
        let context = context();
        let world = WorldId::new("overworld");

        plugin.init(context.clone()).await.unwrap();
        assert!(plugin.initialized);

        plugin
            .on_world_added(context.clone(), WorldAddedEvent::now(world.clone()))
            .await
            .unwrap();
        assert_eq!(plugin.worlds_seen.load(Ordering::SeqCst), 1);

        // Hooks the plugin does not implement fall back to Ok(()).
        plugin
            .on_world_removed(context.clone(), WorldRemovedEvent::now(world))
            .await
            .unwrap();
        plugin.shutdown(context).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_failures_surface_to_the_host() {
        let mut plugin = CountingPlugin::new(true);
        let context = context();
        plugin.init(context.clone()).await.unwrap();

        let err = plugin.shutdown(context).await.unwrap_err();
        assert!(matches!(err, PluginError::ShutdownFailed(_)));
    }
}
