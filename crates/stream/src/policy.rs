use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("render distance {render} exceeds retention distance {retention}")]
    RenderExceedsRetention { render: f32, retention: f32 },
    #[error(
        "extraction radius {radius} reaches {reach} world units, beyond retention {retention}"
    )]
    RadiusExceedsRetention {
        radius: i32,
        reach: f32,
        retention: f32,
    },
}

/// Distance policy separating render culling from cache eviction.
///
/// Two thresholds, both world-space distances from the camera's chunk
/// center to a mesh's chunk center: meshes beyond `render_distance` are
/// skipped when drawing, meshes beyond `retention_distance` are dropped
/// from the cache. Keeping retention looser than rendering means a camera
/// oscillating across a cell border does not thrash re-extraction.
#[derive(Debug, Clone, Copy)]
pub struct CullPolicy {
    render_distance: f32,
    retention_distance: f32,
}

impl CullPolicy {
    pub fn new(render_distance: f32, retention_distance: f32) -> Result<Self, PolicyError> {
        if render_distance > retention_distance {
            return Err(PolicyError::RenderExceedsRetention {
                render: render_distance,
                retention: retention_distance,
            });
        }
        Ok(Self {
            render_distance,
            retention_distance,
        })
    }

    pub fn render_distance(&self) -> f32 {
        self.render_distance
    }

    pub fn retention_distance(&self) -> f32 {
        self.retention_distance
    }

    /// Whether a mesh at squared distance `distance2` is culled.
    ///
    /// `for_rendering` selects the tighter render threshold; eviction
    /// queries pass false and use the retention threshold.
    pub fn is_distance_culled(&self, distance2: f32, for_rendering: bool) -> bool {
        let limit = if for_rendering {
            self.render_distance
        } else {
            self.retention_distance
        };
        distance2 > limit * limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_must_not_exceed_retention() {
        assert!(CullPolicy::new(100.0, 50.0).is_err());
        assert!(CullPolicy::new(50.0, 50.0).is_ok());
        assert!(CullPolicy::new(50.0, 100.0).is_ok());
    }

    #[test]
    fn thresholds_are_independent() {
        let policy = CullPolicy::new(50.0, 100.0).unwrap();
        let d2 = 60.0f32 * 60.0;
        // Too far to draw, close enough to keep cached.
        assert!(policy.is_distance_culled(d2, true));
        assert!(!policy.is_distance_culled(d2, false));
    }

    #[test]
    fn boundary_is_inclusive() {
        let policy = CullPolicy::new(50.0, 100.0).unwrap();
        assert!(!policy.is_distance_culled(50.0 * 50.0, true));
        assert!(policy.is_distance_culled(50.0 * 50.0 + 1.0, true));
        assert!(!policy.is_distance_culled(100.0 * 100.0, false));
    }
}
