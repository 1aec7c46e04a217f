//! Core value types shared between the host boundary and plugin code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chunks are 32 blocks on a side; block-to-chunk conversion is a shift.
pub const CHUNK_SHIFT: u32 = 5;

/// Identifies a world managed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(String);

impl WorldId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Per-axis tolerance check: every axis delta must be within `tolerance`.
    pub fn within(&self, other: Position, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    pub fn distance_sq(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// The chunk this position falls into.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x.floor() as i32) >> CHUNK_SHIFT,
            z: (self.z.floor() as i32) >> CHUNK_SHIFT,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Chunk coordinates within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// A generation-checked reference to a live entity.
///
/// The host may remove entities through channels a plugin does not control, so
/// a handle is never assumed live: slot indices are reused with a bumped
/// generation, and [`crate::WorldHost::is_valid`] is the only authority on
/// whether a handle still points at anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    pub slot: u32,
    pub generation: u32,
}

impl EntityHandle {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}g{}", self.slot, self.generation)
    }
}

/// What kind of entity the host should instantiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A decorative model entity with no AI (e.g. a hologram carrier).
    Model(String),
    /// An NPC driven by one of the host's behaviour roles.
    Role(String),
}

/// A spawn request handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub kind: EntityKind,
    /// Floating name text rendered above the entity, if any.
    pub nameplate: Option<String>,
    pub position: Position,
    pub yaw: f32,
}

impl EntitySpec {
    pub fn new(kind: EntityKind, position: Position) -> Self {
        Self {
            kind,
            nameplate: None,
            position,
            yaw: 0.0,
        }
    }

    pub fn with_nameplate(mut self, text: impl Into<String>) -> Self {
        self.nameplate = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_within_is_per_axis() {
        let a = Position::new(10.0, 64.0, 10.0);
        assert!(a.within(Position::new(10.9, 64.5, 10.1), 1.0));
        // One axis out of tolerance fails even if the others are exact.
        assert!(!a.within(Position::new(10.0, 65.5, 10.0), 1.0));
    }

    #[test]
    fn chunk_derivation_shifts_block_coords() {
        assert_eq!(Position::new(10.0, 64.0, 10.0).chunk(), ChunkPos { x: 0, z: 0 });
        assert_eq!(Position::new(32.0, 0.0, 95.9).chunk(), ChunkPos { x: 1, z: 2 });
        // Negative coordinates round toward negative infinity.
        assert_eq!(Position::new(-0.5, 0.0, -33.0).chunk(), ChunkPos { x: -1, z: -2 });
    }

    #[test]
    fn handle_display_includes_generation() {
        assert_eq!(EntityHandle::new(3, 7).to_string(), "e3g7");
    }
}
