use crate::entities::EntityStore;
use glam::{IVec3, UVec2, Vec3};
use std::sync::Arc;
use thiserror::Error;
use voxelfront_common::{EntityId, GridPos, Transform};
use voxelfront_mesh::MeshCategory;
use voxelfront_render::{FlyCamera, RenderBackend, RenderError, SceneSettings, WorldFrame};
use voxelfront_stream::{PolicyError, StreamConfig, StreamStats, WorldStreamer};
use voxelfront_volume::{Voxel, VolumeError, VoxelVolume};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// The world frontend: volume, streamer, entities, and a render backend
/// behind one lifecycle.
///
/// Per frame the owner calls `extract_new_meshes` with the camera position,
/// `on_running` with the frame delta, then the render calls. Everything here
/// runs on the owning thread; extraction workers are managed by the
/// streamer.
pub struct WorldFrontend<B: RenderBackend> {
    volume: Arc<VoxelVolume>,
    streamer: WorldStreamer<B::Resource>,
    entities: EntityStore,
    backend: B,
    settings: SceneSettings,
    initialized: bool,
    uptime: f32,
}

impl<B: RenderBackend> WorldFrontend<B> {
    pub fn new(
        volume: Arc<VoxelVolume>,
        config: StreamConfig,
        backend: B,
    ) -> Result<Self, EngineError> {
        let streamer = WorldStreamer::new(Arc::clone(&volume), config)?;
        Ok(Self {
            volume,
            streamer,
            entities: EntityStore::new(),
            backend,
            settings: SceneSettings::default(),
            initialized: false,
            uptime: 0.0,
        })
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SceneSettings {
        &mut self.settings
    }

    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Bring up the render backend. A failed init leaves the frontend
    /// unusable for rendering; callers treat the error as fatal.
    pub fn on_init(&mut self, dimension: UVec2) -> Result<(), EngineError> {
        let span = tracing::info_span!("on_init", ?dimension);
        let _enter = span.enter();
        self.backend.init(dimension)?;
        self.initialized = true;
        Ok(())
    }

    /// Propagate a window resize to the backend.
    pub fn resize(&mut self, dimension: UVec2) {
        self.backend.resize(dimension);
    }

    /// Per-frame update: merge finished extractions into the mesh cache.
    /// Never blocks; work that is not ready stays pending.
    pub fn on_running(&mut self, dt: f32) {
        self.uptime += dt;
        let merged = self.streamer.merge_completed(&mut self.backend);
        if merged > 0 {
            tracing::debug!(merged, uptime = self.uptime, "meshes merged");
        }
    }

    /// See [`WorldStreamer::extract_new_meshes`].
    pub fn extract_new_meshes(&mut self, position: Vec3, force: bool) -> bool {
        self.streamer.extract_new_meshes(position, force)
    }

    /// Initial extraction burst around the spawn point.
    pub fn on_spawn(&mut self, position: Vec3, radius: i32) {
        self.streamer.on_spawn(position, radius);
    }

    /// Draw the streamed world: cull each cached mesh by render distance
    /// and hand the survivors to the backend.
    pub fn render_world(&mut self, camera: &FlyCamera) -> Result<(), EngineError> {
        let mut frame = WorldFrame::default();
        for category in MeshCategory::ALL {
            for mesh in self.streamer.visible(category, camera.position) {
                frame.push(category, &mesh.resource);
            }
        }
        self.backend.render_world(camera, &self.settings, &frame)?;
        Ok(())
    }

    /// Draw dynamic entities on top of the world.
    pub fn render_entities(&mut self, camera: &FlyCamera) -> Result<(), EngineError> {
        let transforms = self.entities.transforms();
        self.backend.render_entities(camera, &transforms)?;
        Ok(())
    }

    /// Flush the frame to the screen (no-op for headless backends).
    pub fn end_frame(&mut self) {
        self.backend.present();
    }

    /// Write one voxel, drop the stale chunk mesh, and queue the cell for
    /// re-extraction so the edit is visible as soon as workers catch up.
    pub fn set_voxel(&mut self, pos: IVec3, voxel: Voxel) -> Result<GridPos, EngineError> {
        let grid = self.volume.set_voxel(pos, voxel)?;
        self.streamer.refresh_cell(grid);
        Ok(grid)
    }

    /// Drop one cell's meshes without re-extracting.
    pub fn delete_mesh(&mut self, grid: GridPos) -> bool {
        self.streamer.delete_mesh(grid)
    }

    pub fn spawn_entity(&mut self, transform: Transform) -> EntityId {
        self.entities.spawn(transform)
    }

    pub fn despawn_entity(&mut self, id: EntityId) -> bool {
        self.entities.despawn(id)
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Forget all streamed meshes, pending work, and camera history. The
    /// volume and entities survive a reset.
    pub fn reset(&mut self) {
        self.streamer.reset();
    }

    pub fn stats(&self) -> StreamStats {
        self.streamer.stats()
    }

    /// Tear down the render backend. Calling this twice is a programming
    /// error.
    pub fn shutdown(&mut self) {
        debug_assert!(self.initialized, "shutdown without init or called twice");
        self.backend.shutdown();
        self.initialized = false;
        tracing::info!(uptime = self.uptime, "frontend shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use voxelfront_render::TextBackend;
    use voxelfront_volume::Material;

    fn frontend(seed: u64) -> WorldFrontend<TextBackend> {
        let volume = Arc::new(VoxelVolume::with_seed(seed));
        let config = StreamConfig {
            extraction_radius: 1,
            render_distance: 100.0,
            retention_distance: 150.0,
            worker_count: 2,
        };
        WorldFrontend::new(volume, config, TextBackend::new()).unwrap()
    }

    fn settle(frontend: &mut WorldFrontend<TextBackend>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while frontend.stats().pending > 0 {
            frontend.on_running(0.016);
            if Instant::now() > deadline {
                panic!("streaming did not settle in time");
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        frontend.on_running(0.016);
    }

    #[test]
    fn full_lifecycle_renders_streamed_world() {
        let mut engine = frontend(42);
        engine.on_init(UVec2::new(640, 360)).unwrap();

        let camera = FlyCamera::default();
        engine.on_spawn(camera.position, 1);
        settle(&mut engine);

        let stats = engine.stats();
        assert!(stats.meshes > 0);
        assert_eq!(stats.pending, 0);

        engine.render_world(&camera).unwrap();
        assert!(engine.backend().last_frame().contains("opaque="));
        engine.render_entities(&camera).unwrap();
        engine.end_frame();
        engine.shutdown();
    }

    #[test]
    fn render_before_init_fails() {
        let mut engine = frontend(42);
        let camera = FlyCamera::default();
        assert!(matches!(
            engine.render_world(&camera),
            Err(EngineError::Render(RenderError::NotInitialized))
        ));
    }

    #[test]
    fn set_voxel_invalidates_and_requeues_the_cell() {
        let mut engine = frontend(42);
        engine.on_init(UVec2::new(640, 360)).unwrap();
        engine.on_spawn(Vec3::new(8.0, 30.0, 8.0), 0);
        settle(&mut engine);
        assert!(engine.stats().meshes > 0);

        engine
            .set_voxel(IVec3::new(4, 50, 4), Voxel::new(Material::Rock))
            .unwrap();
        // The stale mesh is gone immediately; re-extraction is pending.
        assert!(!engine.delete_mesh(GridPos::new(0, 0)));
        assert_eq!(engine.stats().pending, 1);
        settle(&mut engine);
        assert!(engine.stats().meshes > 0);
        engine.shutdown();
    }

    #[test]
    fn edit_races_spawn_extraction() {
        let mut engine = frontend(42);
        engine.on_init(UVec2::new(640, 360)).unwrap();
        engine.on_spawn(Vec3::new(8.0, 30.0, 8.0), 0);
        // Edit immediately, while the spawn extraction is likely still in
        // flight. The edit must survive: the cell ends up re-extracted and
        // nothing stays pending.
        engine
            .set_voxel(IVec3::new(4, 60, 4), Voxel::new(Material::Rock))
            .unwrap();
        settle(&mut engine);
        assert!(engine.stats().meshes > 0);
        assert_eq!(engine.stats().pending, 0);
        engine.shutdown();
    }

    #[test]
    fn set_voxel_out_of_bounds_is_a_volume_error() {
        let mut engine = frontend(42);
        let result = engine.set_voxel(IVec3::new(0, -1, 0), Voxel::AIR);
        assert!(matches!(result, Err(EngineError::Volume(_))));
    }

    #[test]
    fn reset_keeps_volume_and_entities() {
        let mut engine = frontend(42);
        engine.on_init(UVec2::new(640, 360)).unwrap();
        let id = engine.spawn_entity(Transform::default());
        engine.on_spawn(Vec3::new(8.0, 30.0, 8.0), 1);
        settle(&mut engine);
        let pages = engine.volume().page_count();
        assert!(pages > 0);

        engine.reset();
        assert_eq!(engine.stats(), StreamStats::default());
        assert_eq!(engine.volume().page_count(), pages);
        assert!(engine.entities().get(id).is_some());
        engine.shutdown();
    }

    #[test]
    fn entities_render_through_the_backend() {
        let mut engine = frontend(42);
        engine.on_init(UVec2::new(640, 360)).unwrap();
        engine.spawn_entity(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        let camera = FlyCamera::default();
        engine.render_world(&camera).unwrap();
        engine.render_entities(&camera).unwrap();
        assert!(engine.backend().last_frame().contains("entity pos="));
        engine.shutdown();
    }
}
