//! Lifecycle events the host delivers to plugins.

use crate::types::{ChunkPos, WorldId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Seconds since the Unix epoch; event timestamps all use this.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A world became available. Fired once per world per server session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldAddedEvent {
    pub world: WorldId,
    pub timestamp: u64,
}

/// A world is being torn down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRemovedEvent {
    pub world: WorldId,
    pub timestamp: u64,
}

/// A chunk finished loading and its entities are accessible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReadyEvent {
    pub world: WorldId,
    pub chunk: ChunkPos,
    pub timestamp: u64,
}

/// A player finished joining and can receive world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerReadyEvent {
    pub player_id: Uuid,
    pub world: WorldId,
    pub timestamp: u64,
}

/// A player disconnected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnectedEvent {
    pub player_id: Uuid,
    pub timestamp: u64,
}

impl WorldAddedEvent {
    pub fn now(world: WorldId) -> Self {
        Self {
            world,
            timestamp: current_timestamp(),
        }
    }
}

impl WorldRemovedEvent {
    pub fn now(world: WorldId) -> Self {
        Self {
            world,
            timestamp: current_timestamp(),
        }
    }
}

impl ChunkReadyEvent {
    pub fn now(world: WorldId, chunk: ChunkPos) -> Self {
        Self {
            world,
            chunk,
            timestamp: current_timestamp(),
        }
    }
}
