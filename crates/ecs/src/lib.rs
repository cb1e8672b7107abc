//! Entity pool for mobile entities (animals, monsters, companions, drops).
//!
//! Every pooled entity is a pair: a visual that shares one texture per kind,
//! and an invisible collision proxy that points back at its owner.
//!
//! # Invariants
//! - Handles are generational; a stale handle never reaches a reused slot.
//! - A kind's shared texture is never disposed while an instance of that kind
//!   is active.
//! - Scene attach/detach is always reported through the event log.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxelcore_common::EntityKind;

/// A handle referencing a mesh asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u64);

/// A handle referencing a texture shared by every instance of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u64);

/// Visual half of a pooled entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renderable {
    pub mesh: MeshHandle,
    pub texture: TextureHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    Box { half_extents: [f32; 3] },
    Sphere { radius: f32 },
}

impl Default for Collider {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

/// Generational reference to a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Invisible collision shape; `owner` resolves hits back to the entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionProxy {
    pub collider: Collider,
    pub position: Vec3,
    pub owner: Option<EntityHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PooledEntity {
    pub kind: EntityKind,
    pub position: Vec3,
    pub visual: Renderable,
    pub proxy: CollisionProxy,
    attached: bool,
}

impl PooledEntity {
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Scene changes for the renderer to mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    Attached {
        handle: EntityHandle,
        kind: EntityKind,
        visual: Renderable,
    },
    Detached {
        handle: EntityHandle,
        kind: EntityKind,
    },
    TextureDisposed {
        kind: EntityKind,
        texture: TextureHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle instances kept per kind.
    pub per_kind_capacity: usize,
    /// Idle instances kept across all kinds.
    pub total_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            per_kind_capacity: 32,
            total_capacity: 128,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocations: u64,
    pub reuses: u64,
    /// Allocations made while the kind already had `per_kind_capacity`
    /// active instances.
    pub overflow_allocations: u64,
    pub destroyed: u64,
    pub active: usize,
    pub pooled: usize,
}

struct Slot {
    generation: u32,
    entity: Option<PooledEntity>,
}

struct SharedTexture {
    handle: TextureHandle,
    active: usize,
}

pub struct EntityPool {
    config: PoolConfig,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    free: HashMap<EntityKind, Vec<u32>>,
    textures: HashMap<EntityKind, SharedTexture>,
    active_per_kind: HashMap<EntityKind, usize>,
    next_texture: u64,
    stats: PoolStats,
    events: Vec<PoolEvent>,
}

impl EntityPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            vacant: Vec::new(),
            free: HashMap::new(),
            textures: HashMap::new(),
            active_per_kind: HashMap::new(),
            next_texture: 1,
            stats: PoolStats::default(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn active_count(&self) -> usize {
        self.stats.active
    }

    pub fn pooled_count(&self) -> usize {
        self.stats.pooled
    }

    pub fn pooled_of(&self, kind: EntityKind) -> usize {
        self.free.get(&kind).map_or(0, Vec::len)
    }

    /// Spawn an entity of `kind` at `position`, reusing an idle instance when
    /// one exists.
    pub fn acquire(&mut self, kind: EntityKind, position: Vec3) -> EntityHandle {
        let texture = self.retain_texture(kind);
        let reused = self.free.get_mut(&kind).and_then(Vec::pop);

        let index = match reused {
            Some(index) => {
                self.stats.reuses += 1;
                self.stats.pooled -= 1;
                index
            }
            None => {
                let active = self.active_per_kind.get(&kind).copied().unwrap_or(0);
                if active >= self.config.per_kind_capacity {
                    self.stats.overflow_allocations += 1;
                    tracing::debug!(?kind, active, "pool overflow allocation");
                }
                self.stats.allocations += 1;
                self.allocate_slot()
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        let handle = EntityHandle {
            index,
            generation: slot.generation,
        };
        let visual = Renderable {
            mesh: mesh_for(kind),
            texture,
        };
        let entity = slot.entity.get_or_insert_with(|| PooledEntity {
            kind,
            position,
            visual,
            proxy: CollisionProxy {
                collider: collider_for(kind),
                position,
                owner: None,
            },
            attached: false,
        });
        entity.position = position;
        entity.visual = visual;
        entity.proxy.position = position;
        entity.proxy.owner = Some(handle);
        entity.attached = true;

        *self.active_per_kind.entry(kind).or_default() += 1;
        self.stats.active += 1;
        self.events.push(PoolEvent::Attached {
            handle,
            kind,
            visual,
        });
        handle
    }

    /// Despawn an entity. Stale or repeated releases return false and change
    /// nothing.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(entity) = slot.entity.as_mut().filter(|e| e.attached) else {
            return false;
        };
        entity.attached = false;
        entity.proxy.owner = None;
        let kind = entity.kind;

        let kind_free = self.free.get(&kind).map_or(0, Vec::len);
        let keep = kind_free < self.config.per_kind_capacity
            && self.stats.pooled < self.config.total_capacity;
        if keep {
            self.free.entry(kind).or_default().push(handle.index);
            self.stats.pooled += 1;
        } else {
            slot.entity = None;
            self.vacant.push(handle.index);
            self.stats.destroyed += 1;
        }

        if let Some(n) = self.active_per_kind.get_mut(&kind) {
            *n = n.saturating_sub(1);
        }
        if let Some(texture) = self.textures.get_mut(&kind) {
            texture.active = texture.active.saturating_sub(1);
        }
        self.stats.active -= 1;
        self.events.push(PoolEvent::Detached { handle, kind });
        true
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&PooledEntity> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entity.as_ref())
            .filter(|e| e.attached)
    }

    pub fn is_active(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Move an active entity and its proxy together.
    pub fn set_position(&mut self, handle: EntityHandle, position: Vec3) -> bool {
        let Some(entity) = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entity.as_mut())
            .filter(|e| e.attached)
        else {
            return false;
        };
        entity.position = position;
        entity.proxy.position = position;
        true
    }

    pub fn active(&self) -> impl Iterator<Item = (EntityHandle, &PooledEntity)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            let entity = s.entity.as_ref().filter(|e| e.attached)?;
            Some((
                EntityHandle {
                    index: i as u32,
                    generation: s.generation,
                },
                entity,
            ))
        })
    }

    /// The shared texture for a kind, if one is loaded.
    pub fn texture_of(&self, kind: EntityKind) -> Option<TextureHandle> {
        self.textures.get(&kind).map(|t| t.handle)
    }

    /// Dispose textures whose kind has no active instance. Returns how many
    /// were disposed.
    pub fn trim_textures(&mut self) -> usize {
        let idle: Vec<EntityKind> = self
            .textures
            .iter()
            .filter(|(_, t)| t.active == 0)
            .map(|(k, _)| *k)
            .collect();
        for kind in &idle {
            if let Some(texture) = self.textures.remove(kind) {
                self.events.push(PoolEvent::TextureDisposed {
                    kind: *kind,
                    texture: texture.handle,
                });
            }
        }
        idle.len()
    }

    /// Drop every idle instance.
    pub fn clear_pooled(&mut self) -> usize {
        let mut dropped = 0;
        for (_, indices) in self.free.drain() {
            for index in indices {
                if let Some(slot) = self.slots.get_mut(index as usize) {
                    slot.entity = None;
                    self.vacant.push(index);
                    dropped += 1;
                }
            }
        }
        self.stats.destroyed += dropped as u64;
        self.stats.pooled = 0;
        dropped
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    fn retain_texture(&mut self, kind: EntityKind) -> TextureHandle {
        let next = &mut self.next_texture;
        let texture = self.textures.entry(kind).or_insert_with(|| {
            let handle = TextureHandle(*next);
            *next += 1;
            SharedTexture { handle, active: 0 }
        });
        texture.active += 1;
        texture.handle
    }

    fn allocate_slot(&mut self) -> u32 {
        if let Some(index) = self.vacant.pop() {
            return index;
        }
        self.slots.push(Slot {
            generation: 0,
            entity: None,
        });
        (self.slots.len() - 1) as u32
    }
}

fn mesh_for(kind: EntityKind) -> MeshHandle {
    MeshHandle(match kind {
        EntityKind::Animal => 1,
        EntityKind::Monster => 2,
        EntityKind::Companion => 3,
        EntityKind::ItemDrop => 4,
        EntityKind::Unknown(id) => 0x1_0000 + id as u64,
    })
}

fn collider_for(kind: EntityKind) -> Collider {
    match kind {
        EntityKind::ItemDrop => Collider::Sphere { radius: 0.25 },
        EntityKind::Monster => Collider::Box {
            half_extents: [0.4, 0.9, 0.4],
        },
        _ => Collider::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(per_kind: usize, total: usize) -> EntityPool {
        EntityPool::new(PoolConfig {
            per_kind_capacity: per_kind,
            total_capacity: total,
        })
    }

    #[test]
    fn second_cycle_allocates_nothing() {
        let mut pool = pool(8, 32);
        let first: Vec<_> = (0..8)
            .map(|i| pool.acquire(EntityKind::Animal, Vec3::splat(i as f32)))
            .collect();
        for h in &first {
            assert!(pool.release(*h));
        }
        let allocations = pool.stats().allocations;
        for i in 0..8 {
            pool.acquire(EntityKind::Animal, Vec3::splat(i as f32));
        }
        let stats = pool.stats();
        assert_eq!(stats.allocations, allocations);
        assert_eq!(stats.reuses, 8);
        assert_eq!(stats.active, 8);
        assert_eq!(stats.pooled, 0);
    }

    #[test]
    fn stale_and_double_release_are_noops() {
        let mut pool = pool(4, 4);
        let h = pool.acquire(EntityKind::Monster, Vec3::ZERO);
        assert!(pool.release(h));
        assert!(!pool.release(h));

        let reused = pool.acquire(EntityKind::Monster, Vec3::ONE);
        assert_eq!(reused.index(), h.index());
        assert_ne!(reused, h);
        assert!(!pool.release(h));
        assert!(pool.get(h).is_none());
        assert!(pool.is_active(reused));
    }

    #[test]
    fn proxy_owner_tracks_lifecycle() {
        let mut pool = pool(4, 4);
        let h = pool.acquire(EntityKind::Companion, Vec3::new(1.0, 2.0, 3.0));
        let e = pool.get(h).unwrap();
        assert_eq!(e.proxy.owner, Some(h));
        assert_eq!(e.proxy.position, Vec3::new(1.0, 2.0, 3.0));

        assert!(pool.set_position(h, Vec3::new(5.0, 2.0, 3.0)));
        assert_eq!(pool.get(h).unwrap().proxy.position.x, 5.0);

        pool.release(h);
        let idle = pool.slots[h.index() as usize].entity.as_ref().unwrap();
        assert_eq!(idle.proxy.owner, None);
        assert!(!idle.is_attached());
    }

    #[test]
    fn overflow_beyond_capacity_is_destroyed_on_release() {
        let mut pool = pool(2, 10);
        let handles: Vec<_> = (0..4)
            .map(|_| pool.acquire(EntityKind::ItemDrop, Vec3::ZERO))
            .collect();
        assert_eq!(pool.stats().overflow_allocations, 2);
        for h in handles {
            pool.release(h);
        }
        let stats = pool.stats();
        assert_eq!(stats.pooled, 2);
        assert_eq!(stats.destroyed, 2);
        assert_eq!(stats.active, 0);
    }

    #[test]
    fn total_capacity_caps_idle_instances() {
        let mut pool = pool(4, 3);
        let a: Vec<_> = (0..2).map(|_| pool.acquire(EntityKind::Animal, Vec3::ZERO)).collect();
        let m: Vec<_> = (0..2).map(|_| pool.acquire(EntityKind::Monster, Vec3::ZERO)).collect();
        for h in a.into_iter().chain(m) {
            pool.release(h);
        }
        assert_eq!(pool.pooled_count(), 3);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[test]
    fn textures_shared_and_trimmed_only_when_idle() {
        let mut pool = pool(4, 4);
        let a = pool.acquire(EntityKind::Animal, Vec3::ZERO);
        let b = pool.acquire(EntityKind::Animal, Vec3::ZERO);
        let m = pool.acquire(EntityKind::Monster, Vec3::ZERO);
        assert_eq!(pool.get(a).unwrap().visual.texture, pool.get(b).unwrap().visual.texture);
        assert_ne!(pool.get(a).unwrap().visual.texture, pool.get(m).unwrap().visual.texture);

        pool.release(a);
        assert_eq!(pool.trim_textures(), 0);
        pool.release(b);
        assert_eq!(pool.trim_textures(), 1);
        assert!(pool.texture_of(EntityKind::Animal).is_none());
        assert!(pool.texture_of(EntityKind::Monster).is_some());

        let again = pool.acquire(EntityKind::Animal, Vec3::ZERO);
        let texture = pool.get(again).unwrap().visual.texture;
        assert_eq!(pool.texture_of(EntityKind::Animal), Some(texture));
    }

    #[test]
    fn events_mirror_scene_changes() {
        let mut pool = pool(4, 4);
        let h = pool.acquire(EntityKind::Animal, Vec3::ZERO);
        pool.release(h);
        pool.trim_textures();
        let events = pool.drain_events();
        assert!(matches!(events[0], PoolEvent::Attached { handle, .. } if handle == h));
        assert!(matches!(events[1], PoolEvent::Detached { handle, .. } if handle == h));
        assert!(matches!(events[2], PoolEvent::TextureDisposed { .. }));
        assert!(pool.events().is_empty());
    }

    #[test]
    fn clear_pooled_drops_idle_instances() {
        let mut pool = pool(4, 4);
        let h = pool.acquire(EntityKind::Animal, Vec3::ZERO);
        pool.release(h);
        assert_eq!(pool.clear_pooled(), 1);
        assert_eq!(pool.pooled_of(EntityKind::Animal), 0);
        pool.acquire(EntityKind::Animal, Vec3::ZERO);
        assert_eq!(pool.stats().allocations, 2);
    }

    #[test]
    fn config_defaults_fill_in() {
        let config: PoolConfig = serde_json::from_str(r#"{ "total_capacity": 9 }"#).unwrap();
        assert_eq!(config.total_capacity, 9);
        assert_eq!(config.per_kind_capacity, PoolConfig::default().per_kind_capacity);
    }
}
