//! Shared types for the voxelfront engine.
//!
//! # Invariants
//! - `GridPos` is the only chunk addressing scheme; every crate converts
//!   world positions through it the same way (floor division).
//! - Types here carry no GPU or threading state.

pub mod grid;
pub mod types;

pub use grid::GridPos;
pub use types::{EntityId, Transform};
