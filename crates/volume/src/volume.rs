use crate::terrain::TerrainGenerator;
use crate::voxel::Voxel;
use glam::{IVec3, Vec3};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use voxelfront_common::GridPos;

/// Horizontal edge length of a chunk column, in voxels.
pub const CHUNK_SIZE: i32 = 16;
/// World height, in voxels. Chunk columns always span the full height.
pub const WORLD_HEIGHT: i32 = 64;

/// Errors from direct volume mutation.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("position {0} is outside the world height range")]
    OutOfBounds(IVec3),
    #[error("chunk column {0:?} has no data and no generator is configured")]
    Ungenerated(GridPos),
}

/// Voxel data for one chunk column.
///
/// Dense storage; absent voxels are air. Pages are immutable once shared --
/// mutation goes through copy-on-write in [`VoxelVolume::set_voxel`].
#[derive(Debug, Clone)]
pub struct VolumePage {
    voxels: Vec<Voxel>,
}

impl VolumePage {
    pub fn empty() -> Self {
        Self {
            voxels: vec![Voxel::AIR; (CHUNK_SIZE * CHUNK_SIZE * WORLD_HEIGHT) as usize],
        }
    }

    fn index(x: i32, y: i32, z: i32) -> usize {
        debug_assert!((0..CHUNK_SIZE).contains(&x));
        debug_assert!((0..WORLD_HEIGHT).contains(&y));
        debug_assert!((0..CHUNK_SIZE).contains(&z));
        ((y * CHUNK_SIZE + z) * CHUNK_SIZE + x) as usize
    }

    /// Sample at page-local coordinates.
    pub fn local(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxels[Self::index(x, y, z)]
    }

    pub fn set_local(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) {
        self.voxels[Self::index(x, y, z)] = voxel;
    }

    /// True if the page contains no non-air voxel.
    pub fn is_empty(&self) -> bool {
        self.voxels.iter().all(|v| v.is_air())
    }
}

/// Sparse, paged voxel data source.
///
/// Pages are generated on demand when a [`TerrainGenerator`] is configured;
/// without one the volume only contains what was written explicitly, and
/// queries against missing pages report "no data yet".
pub struct VoxelVolume {
    pages: RwLock<HashMap<GridPos, Arc<VolumePage>>>,
    generator: Option<TerrainGenerator>,
}

impl VoxelVolume {
    /// Volume backed by deterministic terrain generation.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            generator: Some(TerrainGenerator::new(seed)),
        }
    }

    /// Volume with no generator; pages exist only if written.
    pub fn empty() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            generator: None,
        }
    }

    pub fn generator(&self) -> Option<&TerrainGenerator> {
        self.generator.as_ref()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    /// Snapshot of the page at a grid cell, if resident.
    pub fn page(&self, grid: GridPos) -> Option<Arc<VolumePage>> {
        self.pages.read().get(&grid).cloned()
    }

    /// Page at a grid cell, generating it if a generator is configured.
    ///
    /// Returns `None` when the cell is ungenerated and no generator exists;
    /// callers treat that as "retry later", not as an error.
    pub fn ensure_page(&self, grid: GridPos) -> Option<Arc<VolumePage>> {
        if let Some(page) = self.page(grid) {
            return Some(page);
        }
        let generator = self.generator?;
        let page = Arc::new(generator.generate_page(grid));
        let mut pages = self.pages.write();
        // Another thread may have generated the same cell in the meantime.
        Some(pages.entry(grid).or_insert_with(|| page).clone())
    }

    /// Install page data for a cell, replacing whatever was resident.
    ///
    /// This is how externally sourced voxel data enters a volume that has
    /// no generator.
    pub fn insert_page(&self, grid: GridPos, page: VolumePage) {
        self.pages.write().insert(grid, Arc::new(page));
    }

    /// Point sample at a world position. Missing pages sample as air.
    pub fn sample(&self, pos: IVec3) -> Voxel {
        if pos.y < 0 || pos.y >= WORLD_HEIGHT {
            return Voxel::AIR;
        }
        let grid = GridPos::new(pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE));
        match self.page(grid) {
            Some(page) => page.local(
                pos.x.rem_euclid(CHUNK_SIZE),
                pos.y,
                pos.z.rem_euclid(CHUNK_SIZE),
            ),
            None => Voxel::AIR,
        }
    }

    /// Write a single voxel. Returns the grid cell whose mesh is now stale.
    ///
    /// Copy-on-write: concurrent readers keep sampling the previous page
    /// snapshot until they re-fetch.
    pub fn set_voxel(&self, pos: IVec3, voxel: Voxel) -> Result<GridPos, VolumeError> {
        if pos.y < 0 || pos.y >= WORLD_HEIGHT {
            return Err(VolumeError::OutOfBounds(pos));
        }
        let grid = GridPos::new(pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE));
        let page = self
            .ensure_page(grid)
            .ok_or(VolumeError::Ungenerated(grid))?;

        let mut updated = (*page).clone();
        updated.set_local(
            pos.x.rem_euclid(CHUNK_SIZE),
            pos.y,
            pos.z.rem_euclid(CHUNK_SIZE),
            voxel,
        );
        self.pages.write().insert(grid, Arc::new(updated));
        tracing::debug!(?grid, ?pos, "voxel written");
        Ok(grid)
    }

    /// Step a ray through the volume, returning the first non-air voxel hit.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<(IVec3, Voxel)> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let step = 0.25f32;
        let mut last = IVec3::new(i32::MIN, i32::MIN, i32::MIN);
        let mut t = 0.0f32;
        while t <= max_dist {
            let p = origin + dir * t;
            let cell = IVec3::new(
                p.x.floor() as i32,
                p.y.floor() as i32,
                p.z.floor() as i32,
            );
            if cell != last {
                let voxel = self.sample(cell);
                if !voxel.is_air() {
                    return Some((cell, voxel));
                }
                last = cell;
            }
            t += step;
        }
        None
    }

    /// Drop all resident pages.
    pub fn clear(&self) {
        self.pages.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::Material;

    #[test]
    fn missing_page_samples_as_air() {
        let volume = VoxelVolume::empty();
        assert!(volume.sample(IVec3::new(100, 10, 100)).is_air());
        assert!(volume.page(GridPos::new(6, 6)).is_none());
    }

    #[test]
    fn ensure_page_without_generator_is_none() {
        let volume = VoxelVolume::empty();
        assert!(volume.ensure_page(GridPos::new(0, 0)).is_none());
    }

    #[test]
    fn ensure_page_generates_once() {
        let volume = VoxelVolume::with_seed(42);
        assert_eq!(volume.page_count(), 0);
        let first = volume.ensure_page(GridPos::new(0, 0)).unwrap();
        let second = volume.ensure_page(GridPos::new(0, 0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(volume.page_count(), 1);
    }

    #[test]
    fn set_voxel_roundtrip() {
        let volume = VoxelVolume::with_seed(42);
        let pos = IVec3::new(3, 40, 3);
        let grid = volume.set_voxel(pos, Voxel::new(Material::Rock)).unwrap();
        assert_eq!(grid, GridPos::new(0, 0));
        assert_eq!(volume.sample(pos), Voxel::new(Material::Rock));
    }

    #[test]
    fn set_voxel_out_of_height_is_error() {
        let volume = VoxelVolume::with_seed(42);
        let result = volume.set_voxel(IVec3::new(0, WORLD_HEIGHT, 0), Voxel::AIR);
        assert!(matches!(result, Err(VolumeError::OutOfBounds(_))));
    }

    #[test]
    fn set_voxel_on_ungenerated_without_generator_is_error() {
        let volume = VoxelVolume::empty();
        let result = volume.set_voxel(IVec3::new(0, 10, 0), Voxel::new(Material::Dirt));
        assert!(matches!(result, Err(VolumeError::Ungenerated(_))));
    }

    #[test]
    fn copy_on_write_preserves_reader_snapshot() {
        let volume = VoxelVolume::with_seed(42);
        let grid = GridPos::new(0, 0);
        let snapshot = volume.ensure_page(grid).unwrap();
        let pos = IVec3::new(1, 30, 1);
        let before = snapshot.local(1, 30, 1);
        volume.set_voxel(pos, Voxel::new(Material::Sand)).unwrap();
        // The held snapshot is unchanged; a fresh sample sees the write.
        assert_eq!(snapshot.local(1, 30, 1), before);
        assert_eq!(volume.sample(pos), Voxel::new(Material::Sand));
    }

    #[test]
    fn concurrent_readers_are_consistent() {
        let volume = Arc::new(VoxelVolume::with_seed(42));
        volume.ensure_page(GridPos::new(0, 0)).unwrap();
        let expected = volume.sample(IVec3::new(5, 10, 5));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let volume = Arc::clone(&volume);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(volume.sample(IVec3::new(5, 10, 5)), expected);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn raycast_hits_terrain() {
        let volume = VoxelVolume::with_seed(42);
        volume.ensure_page(GridPos::new(0, 0)).unwrap();
        let hit = volume.raycast(
            Vec3::new(8.0, WORLD_HEIGHT as f32 - 1.0, 8.0),
            Vec3::NEG_Y,
            WORLD_HEIGHT as f32,
        );
        let (cell, voxel) = hit.expect("ray straight down must hit terrain");
        assert!(!voxel.is_air());
        assert_eq!((cell.x, cell.z), (8, 8));
    }

    #[test]
    fn raycast_through_empty_volume_misses() {
        let volume = VoxelVolume::empty();
        assert!(volume
            .raycast(Vec3::new(0.0, 30.0, 0.0), Vec3::X, 50.0)
            .is_none());
    }
}
