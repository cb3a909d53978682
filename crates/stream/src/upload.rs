use voxelfront_mesh::{Geometry, MeshCategory};

/// Converts completed extraction geometry into a renderable mesh resource.
///
/// Implementations own the GPU context (or a stand-in for it) and are only
/// ever called from the owning thread. Worker threads never see this trait.
pub trait MeshUpload {
    type Resource;

    fn upload(&mut self, category: MeshCategory, geometry: &Geometry) -> Self::Resource;
}

/// Upload backend that keeps geometry on the CPU.
///
/// Used by the headless renderer and by tests; the "resource" is the
/// geometry itself.
#[derive(Debug, Default)]
pub struct CpuUpload;

impl MeshUpload for CpuUpload {
    type Resource = Geometry;

    fn upload(&mut self, _category: MeshCategory, geometry: &Geometry) -> Geometry {
        geometry.clone()
    }
}
