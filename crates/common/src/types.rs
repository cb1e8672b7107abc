use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Horizontal footprint of a chunk column, in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Highest block Y the world can hold. Used as the vertical cap when culling
/// has no aboveground limit configured.
pub const WORLD_HEIGHT: i32 = 256;

/// Integer coordinate of a single voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The voxel containing a world-space point.
    pub fn from_world(pos: Vec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// The chunk column this voxel belongs to.
    pub fn chunk(self) -> ChunkKey {
        ChunkKey::new(
            self.x.div_euclid(CHUNK_SIZE),
            self.z.div_euclid(CHUNK_SIZE),
        )
    }

    /// Centre of the voxel in world space.
    pub fn center(self) -> Vec3 {
        Vec3::new(
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        )
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl From<IVec3> for BlockCoord {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<BlockCoord> for IVec3 {
    fn from(c: BlockCoord) -> Self {
        IVec3::new(c.x, c.y, c.z)
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// A vertical chunk column, identified by its (x, z) chunk coordinates.
///
/// The canonical string form is `"x,z"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub z: i32,
}

impl ChunkKey {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a world-space position.
    pub fn from_world(pos: Vec3) -> Self {
        BlockCoord::from_world(pos).chunk()
    }

    /// Chebyshev distance in chunk units. Radii are square, matching the
    /// load/cleanup/unload rings.
    pub fn distance(self, other: ChunkKey) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// World-space X of the chunk's first column.
    pub fn origin_x(self) -> i32 {
        self.x * CHUNK_SIZE
    }

    /// World-space Z of the chunk's first column.
    pub fn origin_z(self) -> i32 {
        self.z * CHUNK_SIZE
    }

    /// Whether a voxel's column lies inside this chunk.
    pub fn contains(self, coord: BlockCoord) -> bool {
        coord.chunk() == self
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// Error parsing the `"x,z"` chunk key form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chunk key {0:?}, expected \"x,z\"")]
pub struct ParseChunkKeyError(pub String);

impl FromStr for ChunkKey {
    type Err = ParseChunkKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseChunkKeyError(s.to_string());
        let (x, z) = s.split_once(',').ok_or_else(err)?;
        let x = x.trim().parse().map_err(|_| err())?;
        let z = z.trim().parse().map_err(|_| err())?;
        Ok(Self::new(x, z))
    }
}

/// Id of a block type this build has no name for.
///
/// Only [`BlockKind::from_id`] builds one, so it never carries a named id and
/// `Unknown` survives a serialize round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnknownBlockId(u16);

impl UnknownBlockId {
    pub fn get(self) -> u16 {
        self.0
    }
}

/// Block type identifier.
///
/// Serialized by numeric id so that ids written by newer content survive a
/// round-trip through `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum BlockKind {
    Grass,
    Dirt,
    Stone,
    Sand,
    Water,
    Wood,
    Leaves,
    Bush,
    Flower,
    Rock,
    Unknown(UnknownBlockId),
}

impl BlockKind {
    const NAMED: [BlockKind; 10] = [
        BlockKind::Grass,
        BlockKind::Dirt,
        BlockKind::Stone,
        BlockKind::Sand,
        BlockKind::Water,
        BlockKind::Wood,
        BlockKind::Leaves,
        BlockKind::Bush,
        BlockKind::Flower,
        BlockKind::Rock,
    ];

    pub fn id(self) -> u16 {
        match self {
            BlockKind::Grass => 1,
            BlockKind::Dirt => 2,
            BlockKind::Stone => 3,
            BlockKind::Sand => 4,
            BlockKind::Water => 5,
            BlockKind::Wood => 6,
            BlockKind::Leaves => 7,
            BlockKind::Bush => 8,
            BlockKind::Flower => 9,
            BlockKind::Rock => 10,
            BlockKind::Unknown(id) => id.get(),
        }
    }

    pub fn from_id(id: u16) -> Self {
        Self::NAMED
            .iter()
            .copied()
            .find(|k| k.id() == id)
            .unwrap_or(BlockKind::Unknown(UnknownBlockId(id)))
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Grass => "grass",
            BlockKind::Dirt => "dirt",
            BlockKind::Stone => "stone",
            BlockKind::Sand => "sand",
            BlockKind::Water => "water",
            BlockKind::Wood => "wood",
            BlockKind::Leaves => "leaves",
            BlockKind::Bush => "bush",
            BlockKind::Flower => "flower",
            BlockKind::Rock => "rock",
            BlockKind::Unknown(_) => "unknown",
        }
    }
}

impl From<u16> for BlockKind {
    fn from(id: u16) -> Self {
        Self::from_id(id)
    }
}

impl From<BlockKind> for u16 {
    fn from(kind: BlockKind) -> Self {
        kind.id()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Unknown(id) => write!(f, "unknown({})", id.get()),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for BlockKind {
    type Err = std::convert::Infallible;

    /// Unrecognised names map to `Unknown(0)`; numeric strings map by id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u16>() {
            return Ok(Self::from_id(id));
        }
        Ok(Self::NAMED
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .unwrap_or(BlockKind::from_id(0)))
    }
}

/// Mobile entity categories served by the entity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Animal,
    Monster,
    Companion,
    ItemDrop,
    Unknown(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_coord_to_chunk_floors_negatives() {
        assert_eq!(BlockCoord::new(0, 5, 0).chunk(), ChunkKey::new(0, 0));
        assert_eq!(BlockCoord::new(15, 5, 15).chunk(), ChunkKey::new(0, 0));
        assert_eq!(BlockCoord::new(16, 5, -1).chunk(), ChunkKey::new(1, -1));
        assert_eq!(BlockCoord::new(-16, 0, -17).chunk(), ChunkKey::new(-1, -2));
    }

    #[test]
    fn from_world_uses_floor() {
        let c = BlockCoord::from_world(Vec3::new(-0.5, 10.9, 3.0));
        assert_eq!(c, BlockCoord::new(-1, 10, 3));
        assert_eq!(ChunkKey::from_world(Vec3::new(20.0, 0.0, -3.0)), ChunkKey::new(1, -1));
    }

    #[test]
    fn chunk_distance_is_chebyshev() {
        let a = ChunkKey::new(0, 0);
        assert_eq!(a.distance(ChunkKey::new(3, -7)), 7);
        assert_eq!(a.distance(a), 0);
    }

    #[test]
    fn chunk_key_string_form() {
        let key = ChunkKey::new(-4, 12);
        assert_eq!(key.to_string(), "-4,12");
        assert_eq!("-4,12".parse::<ChunkKey>().unwrap(), key);
        assert_eq!(" 3 , 5 ".parse::<ChunkKey>().unwrap(), ChunkKey::new(3, 5));
        assert!("nope".parse::<ChunkKey>().is_err());
        assert!("1,x".parse::<ChunkKey>().is_err());
    }

    #[test]
    fn chunk_contains_its_columns() {
        let key = ChunkKey::new(1, 0);
        assert!(key.contains(BlockCoord::new(16, -40, 15)));
        assert!(!key.contains(BlockCoord::new(15, 0, 0)));
    }

    #[test]
    fn block_kind_unknown_ids_survive() {
        assert_eq!(BlockKind::from_id(3), BlockKind::Stone);
        let unknown = BlockKind::from_id(900);
        assert!(matches!(unknown, BlockKind::Unknown(id) if id.get() == 900));
        let json = serde_json::to_string(&unknown).unwrap();
        assert_eq!(json, "900");
        let back: BlockKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unknown);
        assert_eq!(unknown.to_string(), "unknown(900)");
    }

    #[test]
    fn every_block_kind_round_trips_by_id() {
        let mut kinds = BlockKind::NAMED.to_vec();
        kinds.extend([BlockKind::from_id(0), BlockKind::from_id(u16::MAX)]);
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(serde_json::from_str::<BlockKind>(&json).unwrap(), kind);
        }
    }

    #[test]
    fn block_kind_parses_names() {
        assert_eq!("Leaves".parse::<BlockKind>().unwrap(), BlockKind::Leaves);
        assert_eq!("6".parse::<BlockKind>().unwrap(), BlockKind::Wood);
        assert_eq!("lava".parse::<BlockKind>().unwrap(), BlockKind::from_id(0));
    }
}
