use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use voxelcore_common::{BlockCoord, BlockKind, ChunkKey};

/// Opaque handle to the renderable object backing a visible block.
///
/// Handles are allocated by the store and never reused within its lifetime,
/// so a renderer can key scene nodes by them without ABA confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// A solid voxel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub kind: BlockKind,
    pub player_placed: bool,
    rendered: bool,
    handle: Option<RenderHandle>,
}

impl BlockRecord {
    fn new(kind: BlockKind, player_placed: bool) -> Self {
        Self {
            kind,
            player_placed,
            rendered: false,
            handle: None,
        }
    }

    /// Whether a visual representation currently exists.
    pub fn rendered(&self) -> bool {
        self.rendered
    }

    pub fn handle(&self) -> Option<RenderHandle> {
        self.handle
    }
}

/// Renderer-facing record of handle creation and destruction.
///
/// The renderer drains these to attach and detach scene nodes; it never
/// creates or frees handles itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    HandleCreated {
        coord: BlockCoord,
        handle: RenderHandle,
        kind: BlockKind,
    },
    HandleDestroyed {
        coord: BlockCoord,
        handle: RenderHandle,
    },
}

/// A block taken out of the store by a bulk chunk removal. Carries enough to
/// put it back exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedBlock {
    pub coord: BlockCoord,
    pub kind: BlockKind,
    pub player_placed: bool,
}

/// Sparse block store keyed by voxel coordinate.
///
/// All occupancy changes flow through `add`/`place`/`remove`/`remove_chunk`,
/// which keep the live counter exact without enumerating the map. A per-chunk
/// index makes column removal proportional to the chunk's block count.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: HashMap<BlockCoord, BlockRecord>,
    chunk_index: HashMap<ChunkKey, HashSet<BlockCoord>>,
    live_count: usize,
    rendered_count: usize,
    next_handle: u64,
    record_events: bool,
    events: Vec<StoreEvent>,
}

impl BlockStore {
    /// Create an empty store that does not record renderer events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that records `StoreEvent`s for a renderer.
    pub fn with_event_log() -> Self {
        Self {
            record_events: true,
            ..Self::default()
        }
    }

    /// Number of occupied voxels. O(1).
    pub fn count(&self) -> usize {
        self.live_count
    }

    /// Number of voxels that currently have a render handle. O(1).
    pub fn rendered_count(&self) -> usize {
        self.rendered_count
    }

    /// Number of chunk columns holding at least one block.
    pub fn chunk_count(&self) -> usize {
        self.chunk_index.len()
    }

    pub fn is_solid(&self, coord: BlockCoord) -> bool {
        self.blocks.contains_key(&coord)
    }

    pub fn get(&self, coord: BlockCoord) -> Option<&BlockRecord> {
        self.blocks.get(&coord)
    }

    pub fn is_rendered(&self, coord: BlockCoord) -> bool {
        self.blocks.get(&coord).is_some_and(|r| r.rendered)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockCoord, &BlockRecord)> {
        self.blocks.iter()
    }

    /// Coordinates of every block in a chunk column.
    pub fn coords_in_chunk(&self, key: ChunkKey) -> Vec<BlockCoord> {
        self.chunk_index
            .get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn chunk_block_count(&self, key: ChunkKey) -> usize {
        self.chunk_index.get(&key).map_or(0, |set| set.len())
    }

    /// Insert a generated block. Returns true only for a newly occupied
    /// coordinate; repeats leave the existing record untouched.
    pub fn add(&mut self, coord: BlockCoord, kind: BlockKind) -> bool {
        self.insert(coord, kind, false)
    }

    /// Insert a player-placed block. Same contract as `add`.
    pub fn place(&mut self, coord: BlockCoord, kind: BlockKind) -> bool {
        self.insert(coord, kind, true)
    }

    fn insert(&mut self, coord: BlockCoord, kind: BlockKind, player_placed: bool) -> bool {
        match self.blocks.entry(coord) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(BlockRecord::new(kind, player_placed));
                self.chunk_index
                    .entry(coord.chunk())
                    .or_default()
                    .insert(coord);
                self.live_count += 1;
                true
            }
        }
    }

    /// Remove a block. Returns whether a record existed.
    pub fn remove(&mut self, coord: BlockCoord) -> bool {
        let Some(record) = self.blocks.remove(&coord) else {
            return false;
        };
        let key = coord.chunk();
        if let Some(set) = self.chunk_index.get_mut(&key) {
            set.remove(&coord);
            if set.is_empty() {
                self.chunk_index.remove(&key);
            }
        }
        self.release_handle(coord, &record);
        self.live_count -= 1;
        true
    }

    /// Remove every block in a chunk column, freeing their handles.
    pub fn remove_chunk(&mut self, key: ChunkKey) -> Vec<RemovedBlock> {
        let Some(coords) = self.chunk_index.remove(&key) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(coords.len());
        for coord in coords {
            if let Some(record) = self.blocks.remove(&coord) {
                self.release_handle(coord, &record);
                self.live_count -= 1;
                removed.push(RemovedBlock {
                    coord,
                    kind: record.kind,
                    player_placed: record.player_placed,
                });
            }
        }
        tracing::trace!(%key, removed = removed.len(), "chunk column removed");
        removed
    }

    /// Put previously removed blocks back. Returns how many were inserted.
    pub fn restore(&mut self, blocks: &[RemovedBlock]) -> usize {
        blocks
            .iter()
            .filter(|b| self.insert(b.coord, b.kind, b.player_placed))
            .count()
    }

    /// Show or hide a block without touching occupancy. Absent coordinates
    /// and no-change calls do nothing.
    pub fn set_rendered(&mut self, coord: BlockCoord, rendered: bool) {
        let Some(record) = self.blocks.get_mut(&coord) else {
            return;
        };
        if record.rendered == rendered {
            return;
        }
        record.rendered = rendered;
        if rendered {
            let handle = RenderHandle(self.next_handle);
            self.next_handle += 1;
            record.handle = Some(handle);
            self.rendered_count += 1;
            if self.record_events {
                self.events.push(StoreEvent::HandleCreated {
                    coord,
                    handle,
                    kind: record.kind,
                });
            }
        } else if let Some(handle) = record.handle.take() {
            self.rendered_count -= 1;
            if self.record_events {
                self.events
                    .push(StoreEvent::HandleDestroyed { coord, handle });
            }
        }
    }

    fn release_handle(&mut self, coord: BlockCoord, record: &BlockRecord) {
        if let Some(handle) = record.handle {
            self.rendered_count -= 1;
            if self.record_events {
                self.events
                    .push(StoreEvent::HandleDestroyed { coord, handle });
            }
        }
    }

    /// Drain and return pending renderer events.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to pending renderer events.
    pub fn events(&self) -> &[StoreEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelcore_common::splitmix64;

    fn c(x: i32, y: i32, z: i32) -> BlockCoord {
        BlockCoord::new(x, y, z)
    }

    #[test]
    fn store_starts_empty() {
        let store = BlockStore::new();
        assert_eq!(store.count(), 0);
        assert_eq!(store.rendered_count(), 0);
        assert_eq!(store.chunk_count(), 0);
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = BlockStore::new();
        assert!(store.add(c(1, 2, 3), BlockKind::Stone));
        assert!(!store.add(c(1, 2, 3), BlockKind::Dirt));
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(c(1, 2, 3)).unwrap().kind, BlockKind::Stone);
    }

    #[test]
    fn remove_reports_existence() {
        let mut store = BlockStore::new();
        store.add(c(0, 0, 0), BlockKind::Grass);
        assert!(store.remove(c(0, 0, 0)));
        assert!(!store.remove(c(0, 0, 0)));
        assert_eq!(store.count(), 0);
        assert!(!store.is_solid(c(0, 0, 0)));
    }

    #[test]
    fn set_rendered_on_absent_is_noop() {
        let mut store = BlockStore::with_event_log();
        store.set_rendered(c(9, 9, 9), true);
        assert_eq!(store.rendered_count(), 0);
        assert!(store.events().is_empty());
    }

    #[test]
    fn set_rendered_toggles_handle_only() {
        let mut store = BlockStore::with_event_log();
        store.add(c(0, 5, 0), BlockKind::Dirt);
        assert!(!store.is_rendered(c(0, 5, 0)));

        store.set_rendered(c(0, 5, 0), true);
        store.set_rendered(c(0, 5, 0), true);
        let record = store.get(c(0, 5, 0)).unwrap();
        assert!(record.rendered());
        assert!(record.handle().is_some());
        assert_eq!(store.rendered_count(), 1);
        assert_eq!(store.count(), 1);

        store.set_rendered(c(0, 5, 0), false);
        assert!(store.get(c(0, 5, 0)).unwrap().handle().is_none());
        assert_eq!(store.rendered_count(), 0);
        assert_eq!(store.count(), 1);
        // create + destroy, the duplicate call emitted nothing
        assert_eq!(store.events().len(), 2);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut store = BlockStore::new();
        store.add(c(0, 0, 0), BlockKind::Stone);
        store.set_rendered(c(0, 0, 0), true);
        let first = store.get(c(0, 0, 0)).unwrap().handle().unwrap();
        store.set_rendered(c(0, 0, 0), false);
        store.set_rendered(c(0, 0, 0), true);
        let second = store.get(c(0, 0, 0)).unwrap().handle().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn remove_destroys_handle() {
        let mut store = BlockStore::with_event_log();
        store.add(c(3, 3, 3), BlockKind::Stone);
        store.set_rendered(c(3, 3, 3), true);
        store.drain_events();

        store.remove(c(3, 3, 3));
        assert_eq!(store.rendered_count(), 0);
        let events = store.drain_events();
        assert!(matches!(events.as_slice(), [StoreEvent::HandleDestroyed { .. }]));
    }

    #[test]
    fn remove_chunk_only_touches_that_column() {
        let mut store = BlockStore::new();
        for y in 0..10 {
            store.add(c(0, y, 0), BlockKind::Stone);
            store.add(c(15, y, 15), BlockKind::Stone);
            store.add(c(16, y, 0), BlockKind::Stone);
            store.add(c(-1, y, 0), BlockKind::Stone);
        }
        store.place(c(5, 20, 5), BlockKind::Wood);
        store.set_rendered(c(0, 0, 0), true);

        let removed = store.remove_chunk(ChunkKey::new(0, 0));
        assert_eq!(removed.len(), 21);
        assert!(removed.iter().any(|b| b.player_placed && b.kind == BlockKind::Wood));
        assert_eq!(store.count(), 20);
        assert_eq!(store.rendered_count(), 0);
        assert_eq!(store.chunk_block_count(ChunkKey::new(0, 0)), 0);
        assert_eq!(store.chunk_block_count(ChunkKey::new(1, 0)), 10);
        assert_eq!(store.chunk_block_count(ChunkKey::new(-1, 0)), 10);

        assert!(store.remove_chunk(ChunkKey::new(0, 0)).is_empty());
    }

    #[test]
    fn restore_puts_blocks_back() {
        let mut store = BlockStore::new();
        store.add(c(1, 1, 1), BlockKind::Grass);
        store.place(c(2, 2, 2), BlockKind::Wood);
        let removed = store.remove_chunk(ChunkKey::new(0, 0));
        assert_eq!(store.count(), 0);

        assert_eq!(store.restore(&removed), 2);
        assert_eq!(store.count(), 2);
        assert!(store.get(c(2, 2, 2)).unwrap().player_placed);
        assert!(!store.get(c(1, 1, 1)).unwrap().player_placed);
    }

    /// Count must equal the number of occupied coordinates for any sequence
    /// of adds and removes, cross-checked by enumeration.
    #[test]
    fn count_matches_enumeration_under_churn() {
        let mut store = BlockStore::new();
        let mut state = 7u64;
        for step in 0..5000 {
            state = splitmix64(state);
            let coord = c(
                (state % 40) as i32 - 20,
                ((state >> 8) % 8) as i32,
                ((state >> 16) % 40) as i32 - 20,
            );
            match (state >> 32) % 5 {
                0 | 1 => {
                    store.add(coord, BlockKind::Stone);
                }
                2 => {
                    store.remove(coord);
                }
                3 => store.set_rendered(coord, true),
                _ => {
                    store.remove_chunk(coord.chunk());
                }
            }
            if step % 250 == 0 {
                assert_eq!(store.count(), store.iter().count());
                let rendered = store.iter().filter(|(_, r)| r.rendered()).count();
                assert_eq!(store.rendered_count(), rendered);
                let indexed: usize = store
                    .iter()
                    .map(|(coord, _)| coord.chunk())
                    .collect::<HashSet<_>>()
                    .iter()
                    .map(|k| store.chunk_block_count(*k))
                    .sum();
                assert_eq!(indexed, store.count());
            }
        }
        assert_eq!(store.count(), store.iter().count());
    }
}
