use glam::Vec3;
use voxelcore_common::{BlockCoord, WORLD_HEIGHT};
use voxelcore_kernel::BlockStore;

/// A ray with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// First solid voxel along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub coord: BlockCoord,
    /// Ray parameter at which the voxel boundary was crossed.
    pub distance: f32,
}

/// Walk the voxel grid along `ray` (Amanatides-Woo DDA) and return the first
/// occupied voxel within `max_distance`.
///
/// A ray starting inside a solid voxel reports nothing. Rays climbing above
/// the world height stop early. A range that is not finite and positive, or
/// a zero direction, reports nothing.
pub fn cast(store: &BlockStore, ray: &Ray, max_distance: f32) -> Option<RayHit> {
    let origin = ray.origin;
    let dir = ray.direction;
    if !(max_distance.is_finite() && max_distance > 0.0) || dir == Vec3::ZERO {
        return None;
    }
    let mut cell = BlockCoord::from_world(origin);
    if store.is_solid(cell) {
        return None;
    }

    let step = |d: f32| -> i32 {
        if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        }
    };
    let first_crossing = |i: i32, s: f32, d: f32| -> f32 {
        if d > 0.0 {
            ((i + 1) as f32 - s) / d
        } else if d < 0.0 {
            (i as f32 - s) / d
        } else {
            f32::INFINITY
        }
    };
    let delta = |d: f32| -> f32 {
        if d != 0.0 {
            (1.0 / d).abs()
        } else {
            f32::INFINITY
        }
    };

    let (step_x, step_y, step_z) = (step(dir.x), step(dir.y), step(dir.z));
    let mut t_max_x = first_crossing(cell.x, origin.x, dir.x);
    let mut t_max_y = first_crossing(cell.y, origin.y, dir.y);
    let mut t_max_z = first_crossing(cell.z, origin.z, dir.z);
    let (t_delta_x, t_delta_y, t_delta_z) = (delta(dir.x), delta(dir.y), delta(dir.z));

    loop {
        let t;
        if t_max_x < t_max_y && t_max_x < t_max_z {
            cell.x += step_x;
            t = t_max_x;
            t_max_x += t_delta_x;
        } else if t_max_y < t_max_z {
            cell.y += step_y;
            t = t_max_y;
            t_max_y += t_delta_y;
        } else {
            cell.z += step_z;
            t = t_max_z;
            t_max_z += t_delta_z;
        }

        if t > max_distance {
            return None;
        }
        if cell.y >= WORLD_HEIGHT && step_y >= 0 {
            return None;
        }
        if store.is_solid(cell) {
            return Some(RayHit {
                coord: cell,
                distance: t,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelcore_common::BlockKind;

    fn floor(y: i32) -> BlockStore {
        let mut store = BlockStore::new();
        for x in -8..8 {
            for z in -8..8 {
                store.add(BlockCoord::new(x, y, z), BlockKind::Stone);
            }
        }
        store
    }

    #[test]
    fn straight_down_hits_floor() {
        let store = floor(10);
        let ray = Ray::new(Vec3::new(0.5, 20.5, 0.5), Vec3::NEG_Y);
        let hit = cast(&store, &ray, 64.0).unwrap();
        assert_eq!(hit.coord, BlockCoord::new(0, 10, 0));
        assert!((hit.distance - 9.5).abs() < 1e-4);
    }

    #[test]
    fn diagonal_hits_floor() {
        let store = floor(0);
        let ray = Ray::new(Vec3::new(0.5, 4.5, 0.5), Vec3::new(1.0, -1.0, 0.3));
        let hit = cast(&store, &ray, 64.0).unwrap();
        assert_eq!(hit.coord.y, 0);
    }

    #[test]
    fn misses_beyond_range_or_upward() {
        let store = floor(0);
        let down = Ray::new(Vec3::new(0.5, 40.5, 0.5), Vec3::NEG_Y);
        assert!(cast(&store, &down, 16.0).is_none());
        let up = Ray::new(Vec3::new(0.5, 4.5, 0.5), Vec3::Y);
        assert!(cast(&store, &up, 1000.0).is_none());
    }

    #[test]
    fn origin_inside_block_reports_nothing() {
        let store = floor(0);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.5), Vec3::NEG_Y);
        assert!(cast(&store, &ray, 10.0).is_none());
    }

    #[test]
    fn unbounded_range_is_refused() {
        let store = floor(0);
        let into_void = Ray::new(Vec3::new(100.5, 4.5, 100.5), Vec3::NEG_Y);
        assert!(cast(&store, &into_void, f32::INFINITY).is_none());
        assert!(cast(&store, &into_void, f32::NAN).is_none());
        let down = Ray::new(Vec3::new(0.5, 4.5, 0.5), Vec3::NEG_Y);
        assert!(cast(&store, &down, f32::INFINITY).is_none());
        assert!(cast(&store, &down, 10.0).is_some());
    }

    #[test]
    fn zero_direction_terminates() {
        let store = floor(0);
        let ray = Ray::new(Vec3::new(0.5, 4.5, 0.5), Vec3::ZERO);
        assert!(cast(&store, &ray, 10.0).is_none());
    }
}
