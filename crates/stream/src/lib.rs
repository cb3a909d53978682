//! Mesh streaming: extraction scheduling, mesh cache, distance policy.
//!
//! The streaming core keeps the render thread free of meshing work. Worker
//! threads sample the voxel volume and produce plain geometry; the owning
//! thread polls completed results once per frame, uploads them through a
//! [`MeshUpload`] backend, and mutates the cache. Single-writer discipline:
//! no lock guards the cache because only one thread ever touches it.
//!
//! # Invariants
//! - At most one live extraction per grid cell; a job superseded by a
//!   refresh or reset is dropped when it completes.
//! - After eviction, every cached mesh lies within the retention distance of
//!   the last processed camera cell.
//! - Merges are idempotent per cell; completion order does not matter.

mod cache;
mod policy;
mod scheduler;
mod streamer;
mod upload;

pub use cache::{ChunkMesh, MeshCache};
pub use policy::{CullPolicy, PolicyError};
pub use scheduler::{ExtractionOutcome, ExtractionScheduler};
pub use streamer::{StreamConfig, StreamStats, WorldStreamer};
pub use upload::{CpuUpload, MeshUpload};

pub fn crate_info() -> &'static str {
    "voxelfront-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
