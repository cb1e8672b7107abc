use voxelcore_common::ChunkKey;

/// All chunks within a square (Chebyshev) radius of `center`, nearest ring
/// first. Order within a ring is stable so budgeted requests are
/// deterministic.
pub fn chunks_in_radius(center: ChunkKey, radius: i32) -> Vec<ChunkKey> {
    if radius < 0 {
        return Vec::new();
    }
    let side = (2 * radius + 1) as usize;
    let mut result = Vec::with_capacity(side * side);
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            result.push(ChunkKey::new(center.x + dx, center.z + dz));
        }
    }
    result.sort_by_key(|k| (k.distance(center), *k));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_radius_counts() {
        assert_eq!(chunks_in_radius(ChunkKey::new(0, 0), 0).len(), 1);
        assert_eq!(chunks_in_radius(ChunkKey::new(0, 0), 1).len(), 9);
        assert_eq!(chunks_in_radius(ChunkKey::new(5, -3), 3).len(), 49);
        assert!(chunks_in_radius(ChunkKey::new(0, 0), -1).is_empty());
    }

    #[test]
    fn nearest_first() {
        let center = ChunkKey::new(2, 2);
        let keys = chunks_in_radius(center, 2);
        assert_eq!(keys[0], center);
        let distances: Vec<_> = keys.iter().map(|k| k.distance(center)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }
}
