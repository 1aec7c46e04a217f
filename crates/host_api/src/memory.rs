//! An in-memory [`WorldHost`] used by tests and local development.
//!
//! Entities live in a slab; removing one frees its slot, and reusing the slot
//! bumps the generation so stale handles fail validity checks. The simulator
//! also offers a few knobs the real engine exercises from the outside:
//! external removal, marker loss across "restarts", and spawn refusal.

use crate::host::{WorldDispatcher, WorldHost};
use crate::types::{EntityHandle, EntitySpec, Position, WorldId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct EntityData {
    world: WorldId,
    spec: EntitySpec,
    /// Marker tag -> catalog id.
    markers: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entity: Option<EntityData>,
}

/// In-memory world host simulator.
#[derive(Debug, Default)]
pub struct MemoryWorldHost {
    slots: Mutex<Vec<Slot>>,
    fail_spawns: AtomicUsize,
}

impl MemoryWorldHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` spawn requests fail, as a host under load or
    /// missing an asset would.
    pub fn fail_next_spawns(&self, count: usize) {
        self.fail_spawns.store(count, Ordering::SeqCst);
    }

    /// Remove an entity the way the host itself would, outside plugin
    /// control. Plugins only notice through `is_valid`.
    pub fn remove_entity_externally(&self, world: &WorldId, handle: EntityHandle) {
        self.remove_entity(world, handle);
    }

    /// Drop every marker with the given tag in a world, simulating the host's
    /// entity persistence recreating entities without plugin components.
    pub fn strip_markers(&self, world: &WorldId, tag: &str) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let mut stripped = 0;
        for slot in slots.iter_mut() {
            if let Some(entity) = slot.entity.as_mut() {
                if entity.world == *world && entity.markers.remove(tag).is_some() {
                    stripped += 1;
                }
            }
        }
        stripped
    }

    /// Number of live entities in a world.
    pub fn live_count(&self, world: &WorldId) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .filter(|s| s.entity.as_ref().is_some_and(|e| e.world == *world))
            .count()
    }

    /// Nameplate text of a live entity.
    pub fn nameplate_of(&self, world: &WorldId, handle: EntityHandle) -> Option<String> {
        let slots = self.slots.lock().unwrap();
        entity_at(&slots, world, handle).and_then(|e| e.spec.nameplate.clone())
    }
}

fn entity_at<'a>(
    slots: &'a [Slot],
    world: &WorldId,
    handle: EntityHandle,
) -> Option<&'a EntityData> {
    let slot = slots.get(handle.slot as usize)?;
    if slot.generation != handle.generation {
        return None;
    }
    slot.entity.as_ref().filter(|e| e.world == *world)
}

impl WorldHost for MemoryWorldHost {
    fn spawn_entity(&self, world: &WorldId, spec: &EntitySpec) -> Option<EntityHandle> {
        if self
            .fail_spawns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!(world = %world, "memory host refusing spawn");
            return None;
        }

        let mut slots = self.slots.lock().unwrap();
        let entity = EntityData {
            world: world.clone(),
            spec: spec.clone(),
            markers: HashMap::new(),
        };

        let index = slots.iter().position(|s| s.entity.is_none());
        let handle = match index {
            Some(i) => {
                // Reusing a freed slot invalidates any handle to its previous
                // occupant.
                slots[i].generation += 1;
                slots[i].entity = Some(entity);
                EntityHandle::new(i as u32, slots[i].generation)
            }
            None => {
                slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                EntityHandle::new(slots.len() as u32 - 1, 0)
            }
        };
        debug!(world = %world, %handle, "memory host spawned entity");
        Some(handle)
    }

    fn remove_entity(&self, world: &WorldId, handle: EntityHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(handle.slot as usize) {
            if slot.generation == handle.generation
                && slot.entity.as_ref().is_some_and(|e| e.world == *world)
            {
                slot.entity = None;
            }
        }
    }

    fn attach_marker(&self, world: &WorldId, handle: EntityHandle, tag: &str, id: &str) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(handle.slot as usize) {
            if slot.generation == handle.generation {
                if let Some(entity) = slot.entity.as_mut().filter(|e| e.world == *world) {
                    entity.markers.insert(tag.to_string(), id.to_string());
                }
            }
        }
    }

    fn scan_marked(&self, world: &WorldId, tag: &str) -> Vec<(EntityHandle, String)> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let entity = slot.entity.as_ref()?;
                if entity.world != *world {
                    return None;
                }
                let id = entity.markers.get(tag)?;
                Some((EntityHandle::new(i as u32, slot.generation), id.clone()))
            })
            .collect()
    }

    fn scan_role(&self, world: &WorldId, role: &str) -> Vec<(EntityHandle, Position)> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let entity = slot.entity.as_ref()?;
                if entity.world != *world {
                    return None;
                }
                match &entity.spec.kind {
                    crate::types::EntityKind::Role(r) if r == role => {
                        Some((EntityHandle::new(i as u32, slot.generation), entity.spec.position))
                    }
                    _ => None,
                }
            })
            .collect()
    }

    fn marker_of(&self, world: &WorldId, handle: EntityHandle, tag: &str) -> Option<String> {
        let slots = self.slots.lock().unwrap();
        entity_at(&slots, world, handle).and_then(|e| e.markers.get(tag).cloned())
    }

    fn position_of(&self, world: &WorldId, handle: EntityHandle) -> Option<Position> {
        let slots = self.slots.lock().unwrap();
        entity_at(&slots, world, handle).map(|e| e.spec.position)
    }

    fn is_valid(&self, world: &WorldId, handle: EntityHandle) -> bool {
        let slots = self.slots.lock().unwrap();
        entity_at(&slots, world, handle).is_some()
    }
}

impl WorldDispatcher for MemoryWorldHost {
    /// The simulator is single-threaded by construction, so world-thread
    /// hand-off degenerates to running the task inline.
    fn execute(&self, _world: &WorldId, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    fn spec_at(x: f64) -> EntitySpec {
        EntitySpec::new(EntityKind::Model("Warp".into()), Position::new(x, 64.0, 0.0))
    }

    #[test]
    fn spawn_and_remove_round_trip() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");

        let handle = host.spawn_entity(&world, &spec_at(1.0)).unwrap();
        assert!(host.is_valid(&world, handle));
        assert_eq!(host.live_count(&world), 1);

        host.remove_entity(&world, handle);
        assert!(!host.is_valid(&world, handle));
        assert_eq!(host.live_count(&world), 0);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");

        let first = host.spawn_entity(&world, &spec_at(1.0)).unwrap();
        host.remove_entity(&world, first);
        let second = host.spawn_entity(&world, &spec_at(2.0)).unwrap();

        assert_eq!(first.slot, second.slot);
        assert_ne!(first.generation, second.generation);
        assert!(!host.is_valid(&world, first));
        assert!(host.is_valid(&world, second));
    }

    #[test]
    fn handles_are_world_scoped() {
        let host = MemoryWorldHost::new();
        let overworld = WorldId::new("overworld");
        let nether = WorldId::new("nether");

        let handle = host.spawn_entity(&overworld, &spec_at(1.0)).unwrap();
        assert!(host.is_valid(&overworld, handle));
        assert!(!host.is_valid(&nether, handle));
    }

    #[test]
    fn markers_attach_scan_and_strip() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");

        let a = host.spawn_entity(&world, &spec_at(1.0)).unwrap();
        let b = host.spawn_entity(&world, &spec_at(2.0)).unwrap();
        host.attach_marker(&world, a, "hologram", "abc123");
        host.attach_marker(&world, b, "hologram", "def456");

        let mut marked = host.scan_marked(&world, "hologram");
        marked.sort_by(|x, y| x.1.cmp(&y.1));
        assert_eq!(marked.len(), 2);
        assert_eq!(marked[0].1, "abc123");

        assert_eq!(host.strip_markers(&world, "hologram"), 2);
        assert!(host.scan_marked(&world, "hologram").is_empty());
        // Entities survive marker loss.
        assert_eq!(host.live_count(&world), 2);
    }

    #[test]
    fn role_scan_matches_only_that_role() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");

        let spec = EntitySpec::new(
            EntityKind::Role("trader".into()),
            Position::new(5.0, 64.0, 5.0),
        );
        host.spawn_entity(&world, &spec).unwrap();
        host.spawn_entity(&world, &spec_at(1.0)).unwrap();

        let found = host.scan_role(&world, "trader");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, Position::new(5.0, 64.0, 5.0));
        assert!(host.scan_role(&world, "guard").is_empty());
    }

    #[test]
    fn spawn_refusal_is_consumed() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");

        host.fail_next_spawns(1);
        assert!(host.spawn_entity(&world, &spec_at(1.0)).is_none());
        assert!(host.spawn_entity(&world, &spec_at(1.0)).is_some());
    }

    #[test]
    fn dispatcher_runs_inline() {
        let host = MemoryWorldHost::new();
        let world = WorldId::new("overworld");
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let inner = flag.clone();
        host.execute(&world, Box::new(move || {
            inner.store(7, Ordering::SeqCst);
        }));
        assert_eq!(flag.load(Ordering::SeqCst), 7);
    }
}
