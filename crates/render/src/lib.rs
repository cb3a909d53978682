//! Renderer-agnostic interface: camera, scene settings, backend trait.
//!
//! # Invariants
//! - Backends never mutate world or streaming state; they consume a frame
//!   description and produce output.
//! - Mesh resources are created on the owning thread via the backend's
//!   [`MeshUpload`] implementation, never by extraction workers.
//!
//! The trait is stable: the headless [`TextBackend`] here and the wgpu
//! backend in `voxelfront-render-wgpu` are interchangeable to consumers.

mod backend;
mod camera;
mod settings;

pub use backend::{RenderBackend, RenderError, TextBackend, WorldFrame};
pub use camera::FlyCamera;
pub use settings::SceneSettings;

pub use voxelfront_stream::MeshUpload;

pub fn crate_info() -> &'static str {
    "voxelfront-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
