use crate::vertex::{material_color, MeshCategory, MeshVertex};
use voxelfront_common::GridPos;
use voxelfront_volume::{Voxel, VolumePage, CHUNK_SIZE, WORLD_HEIGHT};

/// Plain triangulated geometry: vertices plus a u32 index list.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3], color: [f32; 4]) {
        let base = self.vertices.len() as u32;
        for position in corners {
            self.vertices.push(MeshVertex {
                position,
                normal,
                color,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
}

/// Extraction result for one chunk column: per-category geometry.
#[derive(Debug, Clone, Default)]
pub struct ChunkGeometry {
    pub grid: GridPos,
    pub opaque: Geometry,
    pub water: Geometry,
    pub plant: Geometry,
}

impl ChunkGeometry {
    pub fn get(&self, category: MeshCategory) -> &Geometry {
        match category {
            MeshCategory::Opaque => &self.opaque,
            MeshCategory::Water => &self.water,
            MeshCategory::Plant => &self.plant,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.water.is_empty() && self.plant.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.opaque.vertex_count() + self.water.vertex_count() + self.plant.vertex_count()
    }
}

// Corner offsets per face, wound counter-clockwise seen from outside.
const FACES: [([i32; 3], [[f32; 3]; 4]); 6] = [
    // +Z
    (
        [0, 0, 1],
        [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    ),
    // -Z
    (
        [0, 0, -1],
        [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    ),
    // +X
    (
        [1, 0, 0],
        [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    ),
    // -X
    (
        [-1, 0, 0],
        [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    ),
    // +Y
    (
        [0, 1, 0],
        [[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    ),
    // -Y
    (
        [0, -1, 0],
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
    ),
];

/// Extract the renderable surface of one chunk column.
///
/// Face-culled cube meshing: a face is emitted only where the neighbouring
/// voxel does not occlude it. Neighbours outside the page sample as air
/// (below the world as solid, so no underside is emitted), which keeps each
/// extraction independent at the cost of faces along chunk seams.
pub fn extract_chunk(page: &VolumePage, grid: GridPos) -> ChunkGeometry {
    let mut out = ChunkGeometry {
        grid,
        ..ChunkGeometry::default()
    };
    let base_x = (grid.x * CHUNK_SIZE) as f32;
    let base_z = (grid.z * CHUNK_SIZE) as f32;

    for y in 0..WORLD_HEIGHT {
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let voxel = page.local(lx, y, lz);
                let Some(category) = MeshCategory::from_material(voxel.material) else {
                    continue;
                };
                let origin = [base_x + lx as f32, y as f32, base_z + lz as f32];
                let color = material_color(voxel.material);

                if category == MeshCategory::Plant {
                    push_cross_quads(&mut out.plant, origin, color);
                    continue;
                }

                let bucket = match category {
                    MeshCategory::Opaque => &mut out.opaque,
                    MeshCategory::Water => &mut out.water,
                    MeshCategory::Plant => unreachable!(),
                };
                for (offset, corners) in FACES {
                    let neighbour = sample_local(page, lx + offset[0], y + offset[1], lz + offset[2]);
                    if !face_visible(voxel, neighbour) {
                        continue;
                    }
                    let corners = corners.map(|c| {
                        [origin[0] + c[0], origin[1] + c[1], origin[2] + c[2]]
                    });
                    let normal = [offset[0] as f32, offset[1] as f32, offset[2] as f32];
                    bucket.push_quad(corners, normal, color);
                }
            }
        }
    }

    tracing::trace!(
        ?grid,
        opaque = out.opaque.vertex_count(),
        water = out.water.vertex_count(),
        plant = out.plant.vertex_count(),
        "chunk extracted"
    );
    out
}

/// Sample within the page; horizontal out-of-page and above-world are air,
/// below-world is treated as solid.
fn sample_local(page: &VolumePage, x: i32, y: i32, z: i32) -> Voxel {
    if y < 0 {
        return Voxel::new(voxelfront_volume::Material::Rock);
    }
    if y >= WORLD_HEIGHT || !(0..CHUNK_SIZE).contains(&x) || !(0..CHUNK_SIZE).contains(&z) {
        return Voxel::AIR;
    }
    page.local(x, y, z)
}

fn face_visible(voxel: Voxel, neighbour: Voxel) -> bool {
    if voxel.is_solid() {
        return !neighbour.is_solid();
    }
    if voxel.is_water() {
        // Water surfaces show against air and flora only; solid neighbours
        // already draw their own face, water neighbours are interior.
        return neighbour.is_air() || neighbour.is_plant();
    }
    false
}

/// Flora meshes as two crossed quads spanning the cell diagonals.
/// Rendered double-sided, so one winding per quad is enough.
fn push_cross_quads(bucket: &mut Geometry, origin: [f32; 3], color: [f32; 4]) {
    let [x, y, z] = origin;
    let up = [0.0, 1.0, 0.0];
    bucket.push_quad(
        [
            [x, y, z],
            [x + 1.0, y, z + 1.0],
            [x + 1.0, y + 1.0, z + 1.0],
            [x, y + 1.0, z],
        ],
        up,
        color,
    );
    bucket.push_quad(
        [
            [x + 1.0, y, z],
            [x, y, z + 1.0],
            [x, y + 1.0, z + 1.0],
            [x + 1.0, y + 1.0, z],
        ],
        up,
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelfront_volume::Material;

    fn page_with(voxels: &[(i32, i32, i32, Material)]) -> VolumePage {
        let mut page = VolumePage::empty();
        for &(x, y, z, material) in voxels {
            page.set_local(x, y, z, Voxel::new(material));
        }
        page
    }

    #[test]
    fn empty_page_extracts_nothing() {
        let page = VolumePage::empty();
        let out = extract_chunk(&page, GridPos::new(0, 0));
        assert!(out.is_empty());
    }

    #[test]
    fn lone_voxel_exposes_six_faces() {
        let page = page_with(&[(4, 10, 4, Material::Rock)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        assert_eq!(out.opaque.vertex_count(), 24);
        assert_eq!(out.opaque.indices.len(), 36);
        assert!(out.water.is_empty());
        assert!(out.plant.is_empty());
    }

    #[test]
    fn buried_voxel_is_culled() {
        // 3x3x3 solid block: only the outer shell faces survive.
        let mut voxels = Vec::new();
        for x in 4..7 {
            for y in 10..13 {
                for z in 4..7 {
                    voxels.push((x, y, z, Material::Rock));
                }
            }
        }
        let page = page_with(&voxels);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        // 6 sides x 9 quads x 4 vertices.
        assert_eq!(out.opaque.vertex_count(), 216);
    }

    #[test]
    fn floor_voxel_has_no_underside() {
        let page = page_with(&[(4, 0, 4, Material::Rock)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        // 5 faces: below-world is treated as solid.
        assert_eq!(out.opaque.vertex_count(), 20);
    }

    #[test]
    fn water_meshes_into_water_bucket() {
        let page = page_with(&[(4, 10, 4, Material::Water)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        assert!(out.opaque.is_empty());
        assert_eq!(out.water.vertex_count(), 24);
    }

    #[test]
    fn adjacent_water_culls_shared_face() {
        let page = page_with(&[(4, 10, 4, Material::Water), (5, 10, 4, Material::Water)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        // Two voxels, the shared pair of faces culled: (2*6 - 2) quads.
        assert_eq!(out.water.vertex_count(), 40);
    }

    #[test]
    fn flora_meshes_as_cross_quads() {
        let page = page_with(&[(4, 10, 4, Material::Flora)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        assert_eq!(out.plant.vertex_count(), 8);
        assert_eq!(out.plant.indices.len(), 12);
    }

    #[test]
    fn vertices_are_in_world_space() {
        let grid = GridPos::new(2, -1);
        let page = page_with(&[(0, 5, 0, Material::Rock)]);
        let out = extract_chunk(&page, grid);
        let min_x = out
            .opaque
            .vertices
            .iter()
            .map(|v| v.position[0])
            .fold(f32::INFINITY, f32::min);
        let min_z = out
            .opaque
            .vertices
            .iter()
            .map(|v| v.position[2])
            .fold(f32::INFINITY, f32::min);
        assert_eq!(min_x, (2 * CHUNK_SIZE) as f32);
        assert_eq!(min_z, (-CHUNK_SIZE) as f32);
    }

    #[test]
    fn solid_face_shows_against_water() {
        let page = page_with(&[(4, 10, 4, Material::Rock), (5, 10, 4, Material::Water)]);
        let out = extract_chunk(&page, GridPos::new(0, 0));
        // Rock keeps all six faces; water loses the face against the rock.
        assert_eq!(out.opaque.vertex_count(), 24);
        assert_eq!(out.water.vertex_count(), 20);
    }
}
