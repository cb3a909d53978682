use crate::camera::FlyCamera;
use crate::settings::SceneSettings;
use glam::UVec2;
use thiserror::Error;
use voxelfront_common::Transform;
use voxelfront_mesh::{Geometry, MeshCategory};
use voxelfront_stream::MeshUpload;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("backend is not initialized")]
    NotInitialized,
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    DeviceRequest(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Meshes to draw this frame, already filtered by render distance.
///
/// References stay valid for the duration of one `render_world` call; the
/// backend must not retain them.
pub struct WorldFrame<'a, R> {
    pub opaque: Vec<&'a R>,
    pub water: Vec<&'a R>,
    pub plant: Vec<&'a R>,
}

impl<'a, R> Default for WorldFrame<'a, R> {
    fn default() -> Self {
        Self {
            opaque: Vec::new(),
            water: Vec::new(),
            plant: Vec::new(),
        }
    }
}

impl<'a, R> WorldFrame<'a, R> {
    pub fn push(&mut self, category: MeshCategory, mesh: &'a R) {
        match category {
            MeshCategory::Opaque => self.opaque.push(mesh),
            MeshCategory::Water => self.water.push(mesh),
            MeshCategory::Plant => self.plant.push(mesh),
        }
    }

    pub fn draw_count(&self) -> usize {
        self.opaque.len() + self.water.len() + self.plant.len()
    }
}

/// A renderer the engine can drive.
///
/// Backends also implement [`MeshUpload`]: the streamer hands them finished
/// geometry to convert into their resource type. Initialization failure is
/// fatal to the caller; draw calls after `shutdown` are a bug.
pub trait RenderBackend: MeshUpload {
    fn init(&mut self, dimension: UVec2) -> Result<(), RenderError>;

    fn resize(&mut self, dimension: UVec2);

    /// Draw the streamed world: opaque and plant geometry first, water
    /// blended last.
    fn render_world(
        &mut self,
        camera: &FlyCamera,
        settings: &SceneSettings,
        frame: &WorldFrame<'_, Self::Resource>,
    ) -> Result<(), RenderError>;

    /// Draw dynamic entities on top of the world geometry.
    fn render_entities(
        &mut self,
        camera: &FlyCamera,
        entities: &[Transform],
    ) -> Result<(), RenderError>;

    /// Flush the frame to the screen. Backends without a swapchain keep the
    /// default no-op.
    fn present(&mut self) {}

    fn shutdown(&mut self);
}

/// Headless backend: keeps geometry on the CPU and renders frame summaries
/// as text. Used by the CLI and by every test that drives the full engine
/// without a GPU.
#[derive(Debug, Default)]
pub struct TextBackend {
    initialized: bool,
    dimension: UVec2,
    frames: usize,
    last_frame: String,
}

impl TextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Text summary of the most recent `render_world` call.
    pub fn last_frame(&self) -> &str {
        &self.last_frame
    }
}

impl MeshUpload for TextBackend {
    type Resource = Geometry;

    fn upload(&mut self, _category: MeshCategory, geometry: &Geometry) -> Geometry {
        geometry.clone()
    }
}

impl RenderBackend for TextBackend {
    fn init(&mut self, dimension: UVec2) -> Result<(), RenderError> {
        self.initialized = true;
        self.dimension = dimension;
        tracing::info!(?dimension, "text backend initialized");
        Ok(())
    }

    fn resize(&mut self, dimension: UVec2) {
        self.dimension = dimension;
    }

    fn render_world(
        &mut self,
        camera: &FlyCamera,
        settings: &SceneSettings,
        frame: &WorldFrame<'_, Geometry>,
    ) -> Result<(), RenderError> {
        if !self.initialized {
            return Err(RenderError::NotInitialized);
        }
        self.frames += 1;
        let vertices: usize = frame
            .opaque
            .iter()
            .chain(&frame.water)
            .chain(&frame.plant)
            .map(|g| g.vertex_count())
            .sum();
        self.last_frame = format!(
            "frame {} eye=({:.1}, {:.1}, {:.1}) fog={:.0} draws: opaque={} water={} plant={} vertices={}\n",
            self.frames,
            camera.position.x,
            camera.position.y,
            camera.position.z,
            settings.fog_range,
            frame.opaque.len(),
            frame.water.len(),
            frame.plant.len(),
            vertices,
        );
        Ok(())
    }

    fn render_entities(
        &mut self,
        _camera: &FlyCamera,
        entities: &[Transform],
    ) -> Result<(), RenderError> {
        if !self.initialized {
            return Err(RenderError::NotInitialized);
        }
        for transform in entities {
            let p = transform.position;
            self.last_frame
                .push_str(&format!("  entity pos=({:.2}, {:.2}, {:.2})\n", p.x, p.y, p.z));
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        tracing::info!(frames = self.frames, "text backend shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn render_before_init_is_an_error() {
        let mut backend = TextBackend::new();
        let result = backend.render_world(
            &FlyCamera::default(),
            &SceneSettings::default(),
            &WorldFrame::default(),
        );
        assert!(matches!(result, Err(RenderError::NotInitialized)));
    }

    #[test]
    fn frame_summary_counts_draws() {
        let mut backend = TextBackend::new();
        backend.init(UVec2::new(640, 360)).unwrap();

        let geometry = Geometry::default();
        let uploaded = backend.upload(MeshCategory::Opaque, &geometry);
        let mut frame = WorldFrame::default();
        frame.push(MeshCategory::Opaque, &uploaded);

        backend
            .render_world(&FlyCamera::default(), &SceneSettings::default(), &frame)
            .unwrap();
        assert!(backend.last_frame().contains("opaque=1"));
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn entities_append_to_frame() {
        let mut backend = TextBackend::new();
        backend.init(UVec2::new(640, 360)).unwrap();
        backend
            .render_world(
                &FlyCamera::default(),
                &SceneSettings::default(),
                &WorldFrame::default(),
            )
            .unwrap();
        let entities = [Transform::from_position(Vec3::new(1.0, 2.0, 3.0))];
        backend
            .render_entities(&FlyCamera::default(), &entities)
            .unwrap();
        assert!(backend.last_frame().contains("entity pos=(1.00, 2.00, 3.00)"));
    }

    #[test]
    fn shutdown_invalidates_backend() {
        let mut backend = TextBackend::new();
        backend.init(UVec2::new(640, 360)).unwrap();
        backend.shutdown();
        let result = backend.render_entities(&FlyCamera::default(), &[]);
        assert!(matches!(result, Err(RenderError::NotInitialized)));
    }
}
