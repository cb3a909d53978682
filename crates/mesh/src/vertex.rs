use bytemuck::{Pod, Zeroable};
use voxelfront_volume::Material;

/// Render category a mesh belongs to. Each category has its own cache bucket
/// and its own shading path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshCategory {
    Opaque,
    Water,
    Plant,
}

impl MeshCategory {
    pub const ALL: [MeshCategory; 3] = [
        MeshCategory::Opaque,
        MeshCategory::Water,
        MeshCategory::Plant,
    ];

    /// Category a material meshes into, or `None` for air.
    pub fn from_material(material: Material) -> Option<Self> {
        match material {
            Material::Air => None,
            Material::Water => Some(MeshCategory::Water),
            Material::Flora => Some(MeshCategory::Plant),
            _ => Some(MeshCategory::Opaque),
        }
    }
}

/// A single mesh vertex, laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

/// Base color per material.
pub fn material_color(material: Material) -> [f32; 4] {
    match material {
        Material::Air => [0.0, 0.0, 0.0, 0.0],
        Material::Grass => [0.33, 0.55, 0.27, 1.0],
        Material::Dirt => [0.42, 0.32, 0.22, 1.0],
        Material::Rock => [0.48, 0.48, 0.50, 1.0],
        Material::Sand => [0.78, 0.72, 0.52, 1.0],
        Material::Water => [0.18, 0.35, 0.60, 0.65],
        Material::Flora => [0.30, 0.62, 0.25, 1.0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_has_no_category() {
        assert_eq!(MeshCategory::from_material(Material::Air), None);
    }

    #[test]
    fn materials_map_to_expected_buckets() {
        assert_eq!(
            MeshCategory::from_material(Material::Grass),
            Some(MeshCategory::Opaque)
        );
        assert_eq!(
            MeshCategory::from_material(Material::Water),
            Some(MeshCategory::Water)
        );
        assert_eq!(
            MeshCategory::from_material(Material::Flora),
            Some(MeshCategory::Plant)
        );
    }

    #[test]
    fn vertex_is_pod_sized() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 40);
    }
}
