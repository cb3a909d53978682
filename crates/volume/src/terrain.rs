use crate::volume::{VolumePage, CHUNK_SIZE, WORLD_HEIGHT};
use crate::voxel::{Material, Voxel};
use voxelfront_common::GridPos;

/// Sea level in world voxels. Columns below this fill with water.
pub const WATER_LEVEL: i32 = 18;

/// Deterministic heightmap terrain generator.
///
/// Built on seeded value noise: lattice points are hashed with splitmix64 and
/// interpolated, so the same seed reproduces the same world on every platform
/// without floating-point ordering concerns.
#[derive(Debug, Clone, Copy)]
pub struct TerrainGenerator {
    seed: u64,
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Terrain surface height at a world column, in `0..WORLD_HEIGHT`.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let mut height = 0.0f32;
        let mut amplitude = 0.5f32;
        // Three octaves of value noise, each doubling frequency.
        for octave in 0..3u32 {
            let cell = 32 >> octave;
            height += self.value_noise(x, z, cell, octave as u64) * amplitude;
            amplitude *= 0.5;
        }
        let span = (WORLD_HEIGHT - 8) as f32;
        (8.0 + height * span * 0.6) as i32
    }

    /// Voxel sample at an absolute world position.
    pub fn voxel_at(&self, x: i32, y: i32, z: i32) -> Voxel {
        if y < 0 || y >= WORLD_HEIGHT {
            return Voxel::AIR;
        }
        let height = self.height_at(x, z);
        if y > height {
            if y <= WATER_LEVEL {
                return Voxel::new(Material::Water);
            }
            // Sparse flora one voxel above dry land.
            if y == height + 1 && height > WATER_LEVEL && self.flora_at(x, z) {
                return Voxel::new(Material::Flora);
            }
            return Voxel::AIR;
        }
        if y == height {
            if height <= WATER_LEVEL + 1 {
                return Voxel::new(Material::Sand);
            }
            return Voxel::new(Material::Grass);
        }
        if y >= height - 3 {
            return Voxel::new(Material::Dirt);
        }
        Voxel::new(Material::Rock)
    }

    /// Generate a full chunk-column page.
    pub fn generate_page(&self, grid: GridPos) -> VolumePage {
        let mut page = VolumePage::empty();
        let base_x = grid.x * CHUNK_SIZE;
        let base_z = grid.z * CHUNK_SIZE;
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                for y in 0..WORLD_HEIGHT {
                    let voxel = self.voxel_at(base_x + lx, y, base_z + lz);
                    if !voxel.is_air() {
                        page.set_local(lx, y, lz, voxel);
                    }
                }
            }
        }
        page
    }

    fn flora_at(&self, x: i32, z: i32) -> bool {
        // Roughly 1 in 16 dry surface columns carries flora.
        lattice_hash(self.seed ^ 0x666c_6f72_61, x, z) % 16 == 0
    }

    fn value_noise(&self, x: i32, z: i32, cell: i32, octave: u64) -> f32 {
        let seed = self.seed.wrapping_add(octave.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        let cx = x.div_euclid(cell);
        let cz = z.div_euclid(cell);
        let fx = x.rem_euclid(cell) as f32 / cell as f32;
        let fz = z.rem_euclid(cell) as f32 / cell as f32;

        let v00 = lattice_unit(seed, cx, cz);
        let v10 = lattice_unit(seed, cx + 1, cz);
        let v01 = lattice_unit(seed, cx, cz + 1);
        let v11 = lattice_unit(seed, cx + 1, cz + 1);

        let sx = smoothstep(fx);
        let sz = smoothstep(fz);
        let a = v00 + (v10 - v00) * sx;
        let b = v01 + (v11 - v01) * sx;
        a + (b - a) * sz
    }
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Splitmix64 over a seed mixed with two lattice coordinates.
fn lattice_hash(seed: u64, x: i32, z: i32) -> u64 {
    let mut state = seed
        ^ (x as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9)
        ^ (z as u64).wrapping_mul(0x94d0_49bb_1331_11eb);
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Lattice hash mapped into `[0, 1)`.
fn lattice_unit(seed: u64, x: i32, z: i32) -> f32 {
    (lattice_hash(seed, x, z) >> 40) as f32 / (1u64 << 24) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_heights() {
        let a = TerrainGenerator::new(42);
        let b = TerrainGenerator::new(42);
        for x in -50..50 {
            for z in -50..50 {
                assert_eq!(a.height_at(x, z), b.height_at(x, z));
            }
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = TerrainGenerator::new(1);
        let b = TerrainGenerator::new(2);
        let diverged = (-50..50).any(|x| a.height_at(x, 0) != b.height_at(x, 0));
        assert!(diverged);
    }

    #[test]
    fn heights_stay_in_world_range() {
        let generator = TerrainGenerator::new(7);
        for x in -100..100 {
            for z in -100..100 {
                let h = generator.height_at(x, z);
                assert!(h >= 0 && h < WORLD_HEIGHT, "height {h} out of range");
            }
        }
    }

    #[test]
    fn column_is_layered() {
        let generator = TerrainGenerator::new(42);
        let h = generator.height_at(5, 5);
        // Below the surface is always solid ground.
        assert!(generator.voxel_at(5, h, 5).is_solid());
        assert!(generator.voxel_at(5, 0, 5).is_solid());
        // Well above the surface and above sea level is air.
        assert!(generator.voxel_at(5, WORLD_HEIGHT - 1, 5).is_air() || h >= WORLD_HEIGHT - 2);
    }

    #[test]
    fn water_fills_below_sea_level() {
        let generator = TerrainGenerator::new(42);
        // Find a column whose surface dips below sea level.
        let mut found = false;
        'outer: for x in -200..200 {
            for z in -200..200 {
                let h = generator.height_at(x, z);
                if h < WATER_LEVEL {
                    assert!(generator.voxel_at(x, WATER_LEVEL, z).is_water());
                    found = true;
                    break 'outer;
                }
            }
        }
        assert!(found, "expected at least one underwater column");
    }

    #[test]
    fn generated_page_matches_point_samples() {
        let generator = TerrainGenerator::new(9);
        let grid = GridPos::new(1, -2);
        let page = generator.generate_page(grid);
        for y in 0..WORLD_HEIGHT {
            let sampled = page.local(3, y, 3);
            let direct = generator.voxel_at(grid.x * CHUNK_SIZE + 3, y, grid.z * CHUNK_SIZE + 3);
            assert_eq!(sampled, direct);
        }
    }
}
