//! Engine facade: one object owning the volume, the mesh streamer, the
//! entity store, and a render backend, exposed through a small lifecycle
//! API (`on_init`, `on_running`, `shutdown`, ...).
//!
//! # Invariants
//! - The facade runs on the owning thread; only extraction workers live
//!   elsewhere.
//! - `shutdown` is called exactly once; a second call is a programming
//!   error.
//! - Voxel edits invalidate the affected chunk mesh before the next frame
//!   can draw it.

mod entities;
mod frontend;

pub use entities::EntityStore;
pub use frontend::{EngineError, WorldFrontend};

pub fn crate_info() -> &'static str {
    "voxelfront-engine v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("engine"));
    }
}
