//! Chunk surface extraction.
//!
//! Converts a voxel page into triangulated geometry, partitioned into the
//! three render categories (opaque, water, plant). Extraction is pure CPU
//! work: output is plain vertex/index vectors with no GPU handles, so it can
//! run on any worker thread.
//!
//! # Invariants
//! - Vertices are emitted in world space; drawing needs no per-chunk
//!   transform.
//! - Extraction reads exactly one page; page borders are treated as air,
//!   keeping extraction tasks independent of each other.

mod extract;
mod vertex;

pub use extract::{extract_chunk, ChunkGeometry, Geometry};
pub use vertex::{MeshCategory, MeshVertex};
