//! wgpu render backend.
//!
//! Deferred pipeline: opaque and plant chunk geometry fill a G-buffer
//! (albedo, world position, normal), a fullscreen directional-light pass
//! consumes it together with a shadow map rendered depth-only from the
//! light's viewpoint, and water draws forward with blending on top.
//!
//! # Invariants
//! - The backend never mutates streaming or world state.
//! - All GPU resources are created and destroyed on the owning thread.
//! - A frame stays in flight from `render_world` until `present`.

mod gpu;
mod shaders;

pub use gpu::{GpuMesh, WgpuBackend};
