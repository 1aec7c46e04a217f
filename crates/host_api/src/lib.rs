//! # Host API
//!
//! The capability interface the game host exposes to plugins. The host engine
//! owns the wire protocol, the ECS, and the world threads; plugins only see the
//! narrow surface defined here: spawn and remove entities, attach identifying
//! markers, scan the live world, and receive lifecycle events.
//!
//! Two things live alongside the trait definitions:
//!
//! - [`MemoryWorldHost`], an in-memory stand-in for the real engine with
//!   generation-checked handles. It backs every test in the workspace and is
//!   handy for running plugin logic outside a server.
//! - The [`Plugin`] trait and [`PluginContext`], the contract a loadable
//!   plugin implements against the host.

pub mod events;
pub mod host;
pub mod memory;
pub mod plugin;
pub mod types;

pub use events::{
    current_timestamp, ChunkReadyEvent, PlayerDisconnectedEvent, PlayerReadyEvent,
    WorldAddedEvent, WorldRemovedEvent,
};
pub use host::{WorldDispatcher, WorldHost};
pub use memory::MemoryWorldHost;
pub use plugin::{Plugin, PluginContext, PluginError, PluginResult};
pub use types::{ChunkPos, EntityHandle, EntityKind, EntitySpec, Position, WorldId};
