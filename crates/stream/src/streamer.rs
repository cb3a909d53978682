use crate::cache::{ChunkMesh, MeshCache};
use crate::policy::{CullPolicy, PolicyError};
use crate::scheduler::ExtractionScheduler;
use crate::upload::MeshUpload;
use glam::Vec3;
use std::sync::Arc;
use voxelfront_common::GridPos;
use voxelfront_mesh::MeshCategory;
use voxelfront_volume::{VoxelVolume, CHUNK_SIZE};

/// Tuning knobs for the streamer.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Chebyshev radius, in cells, of the extraction square around the
    /// camera cell. Radius 1 enumerates exactly 9 candidates. The square's
    /// corners must fit inside `retention_distance`, checked at construction.
    pub extraction_radius: i32,
    /// World-space draw cutoff, chunk center to chunk center.
    pub render_distance: f32,
    /// World-space eviction cutoff; must be at least `render_distance`.
    pub retention_distance: f32,
    pub worker_count: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            extraction_radius: 4,
            render_distance: 200.0,
            retention_distance: 250.0,
            worker_count: 2,
        }
    }
}

/// Streaming counters reported to callers each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Cached mesh entries across all categories.
    pub meshes: usize,
    /// Extractions merged since creation or the last reset.
    pub extracted: usize,
    /// Cells with an extraction currently in flight.
    pub pending: usize,
}

/// Owns the streaming state machine around one camera.
///
/// Per frame the owner calls [`extract_new_meshes`](Self::extract_new_meshes)
/// with the camera position, then [`merge_completed`](Self::merge_completed)
/// with an upload backend. Extraction is requested only when the camera
/// crosses a cell border (or when forced), and eviction of out-of-range
/// meshes happens synchronously inside that same call, before anything is
/// drawn again.
pub struct WorldStreamer<R> {
    scheduler: ExtractionScheduler,
    cache: MeshCache<R>,
    policy: CullPolicy,
    extraction_radius: i32,
    last_grid: Option<GridPos>,
    extracted: usize,
}

impl<R> WorldStreamer<R> {
    pub fn new(volume: Arc<VoxelVolume>, config: StreamConfig) -> Result<Self, PolicyError> {
        let policy = CullPolicy::new(config.render_distance, config.retention_distance)?;
        let radius = config.extraction_radius.max(0);
        // Corner cells of the extraction square sit radius * sqrt(2) chunks
        // out. A square that pokes past retention would schedule cells whose
        // results the merge immediately discards, over and over.
        let reach = (radius * CHUNK_SIZE) as f32 * std::f32::consts::SQRT_2;
        if reach > config.retention_distance {
            return Err(PolicyError::RadiusExceedsRetention {
                radius,
                reach,
                retention: config.retention_distance,
            });
        }
        Ok(Self {
            scheduler: ExtractionScheduler::new(volume, config.worker_count),
            cache: MeshCache::new(),
            policy,
            extraction_radius: radius,
            last_grid: None,
            extracted: 0,
        })
    }

    pub fn cache(&self) -> &MeshCache<R> {
        &self.cache
    }

    pub fn policy(&self) -> &CullPolicy {
        &self.policy
    }

    pub fn last_grid(&self) -> Option<GridPos> {
        self.last_grid
    }

    /// Request extraction around the camera if it entered a new grid cell.
    ///
    /// Returns true when a pass ran. Without `force`, a camera that stayed
    /// inside its cell is a no-op; `force` reruns the pass in place (used
    /// after voxel edits). Out-of-retention meshes are evicted here,
    /// synchronously, so a stale mesh is never drawn after the move.
    pub fn extract_new_meshes(&mut self, position: Vec3, force: bool) -> bool {
        let grid = GridPos::from_world(position, CHUNK_SIZE);
        if !force && self.last_grid == Some(grid) {
            return false;
        }
        self.last_grid = Some(grid);
        self.evict(grid);
        self.extract_around(grid, self.extraction_radius);
        true
    }

    /// Seed the cache around a spawn point with a wider radius than the
    /// per-frame pass uses.
    pub fn on_spawn(&mut self, position: Vec3, radius: i32) {
        let grid = GridPos::from_world(position, CHUNK_SIZE);
        tracing::info!(?grid, radius, "spawn extraction burst");
        self.last_grid = Some(grid);
        self.evict(grid);
        self.extract_around(grid, radius.max(0));
    }

    /// Queue every non-cached, non-pending cell in the Chebyshev square.
    fn extract_around(&mut self, center: GridPos, radius: i32) {
        let span = tracing::debug_span!("extract_around", ?center, radius);
        let _enter = span.enter();
        let mut requested = 0usize;
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let cell = GridPos::new(center.x + dx, center.z + dz);
                if self.cache.contains(cell) || self.scheduler.is_pending(cell) {
                    continue;
                }
                if self.scheduler.request(cell) {
                    requested += 1;
                }
            }
        }
        if requested > 0 {
            tracing::debug!(requested, pending = self.scheduler.pending_count(), "extraction pass");
        }
    }

    fn evict(&mut self, center: GridPos) {
        let policy = self.policy;
        let dropped = self
            .cache
            .retain(|grid| !policy.is_distance_culled(grid.distance2(center, CHUNK_SIZE), false));
        if dropped > 0 {
            tracing::debug!(dropped, ?center, "evicted out-of-range meshes");
        }
    }

    /// Poll finished extractions and move their geometry into the cache.
    ///
    /// Results for cells that fell out of retention while their extraction
    /// was in flight are discarded without upload. No-data outcomes are
    /// dropped silently; the cell stays absent and a later pass retries it.
    /// Returns the number of cells merged.
    pub fn merge_completed<U: MeshUpload<Resource = R>>(&mut self, uploader: &mut U) -> usize {
        let mut merged = 0usize;
        for outcome in self.scheduler.poll_completed() {
            let Some(geometry) = outcome.geometry else {
                tracing::trace!(grid = ?outcome.grid, "no voxel data yet, will retry");
                continue;
            };
            if let Some(last) = self.last_grid {
                let d2 = outcome.grid.distance2(last, CHUNK_SIZE);
                if self.policy.is_distance_culled(d2, false) {
                    tracing::trace!(grid = ?outcome.grid, "stale extraction discarded");
                    continue;
                }
            }
            self.extracted += 1;
            merged += 1;
            for category in MeshCategory::ALL {
                let bucket = geometry.get(category);
                if bucket.is_empty() {
                    continue;
                }
                let resource = uploader.upload(category, bucket);
                self.cache.insert(
                    category,
                    ChunkMesh {
                        grid: outcome.grid,
                        vertex_count: bucket.vertex_count(),
                        resource,
                    },
                );
            }
        }
        merged
    }

    /// Cached meshes of one category within render distance of the camera.
    pub fn visible(
        &self,
        category: MeshCategory,
        camera_pos: Vec3,
    ) -> impl Iterator<Item = &ChunkMesh<R>> {
        let camera_cell = GridPos::from_world(camera_pos, CHUNK_SIZE);
        let policy = self.policy;
        self.cache.iter(category).filter(move |mesh| {
            !policy.is_distance_culled(mesh.grid.distance2(camera_cell, CHUNK_SIZE), true)
        })
    }

    /// Drop one cell's meshes, e.g. after a voxel edit made them stale.
    pub fn delete_mesh(&mut self, grid: GridPos) -> bool {
        self.cache.delete_mesh(grid)
    }

    /// Drop a cell's meshes and queue it for immediate re-extraction.
    /// Used after voxel edits. An extraction already in flight for the cell
    /// is superseded: its pre-edit geometry is dropped when it completes.
    pub fn refresh_cell(&mut self, grid: GridPos) {
        self.cache.delete_mesh(grid);
        self.scheduler.refresh(grid);
    }

    /// Drop all meshes and forget in-flight work and camera history.
    pub fn reset(&mut self) {
        tracing::info!("streamer reset");
        self.cache.clear();
        self.scheduler.reset();
        self.last_grid = None;
        self.extracted = 0;
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            meshes: self.cache.total_len(),
            extracted: self.extracted,
            pending: self.scheduler.pending_count(),
        }
    }
}
