//! Paged voxel volume.
//!
//! The volume is a sparse collection of chunk-column pages. Pages may be
//! absent (ungenerated); sampling an absent page yields air and callers that
//! need real data treat the absence as "not yet available", never as an error.
//!
//! # Invariants
//! - Reads are safe from any number of threads concurrently.
//! - Page mutation is copy-on-write; readers holding a page snapshot are
//!   never invalidated mid-sample.
//! - Generation is deterministic: same seed, same world.

pub mod terrain;
pub mod voxel;
mod volume;

pub use terrain::{TerrainGenerator, WATER_LEVEL};
pub use volume::{VolumeError, VolumePage, VoxelVolume, CHUNK_SIZE, WORLD_HEIGHT};
pub use voxel::{Material, Voxel};
