use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A chunk-column coordinate in the voxel grid.
///
/// Chunks span the full world height, so the vertical axis needs no
/// coordinate of its own; meshes and volume pages are addressed by x/z only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPos {
    pub x: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Snap a world position to the chunk grid (floor division).
    pub fn from_world(pos: Vec3, chunk_size: i32) -> Self {
        let size = chunk_size as f32;
        Self {
            x: (pos.x / size).floor() as i32,
            z: (pos.z / size).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this chunk column.
    pub fn world_min(&self, chunk_size: i32) -> Vec3 {
        Vec3::new((self.x * chunk_size) as f32, 0.0, (self.z * chunk_size) as f32)
    }

    /// World-space center of this chunk column at the given height.
    pub fn world_center(&self, chunk_size: i32, center_y: f32) -> Vec3 {
        let half = chunk_size as f32 * 0.5;
        Vec3::new(
            (self.x * chunk_size) as f32 + half,
            center_y,
            (self.z * chunk_size) as f32 + half,
        )
    }

    /// Squared world-space distance between the chunk centers of two cells.
    pub fn distance2(&self, other: GridPos, chunk_size: i32) -> f32 {
        let a = self.world_center(chunk_size, 0.0);
        let b = other.world_center(chunk_size, 0.0);
        a.distance_squared(b)
    }

    /// Chebyshev distance in cells. Used for candidate-cell enumeration.
    pub fn chebyshev(&self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}
