use glam::Vec3;

/// Scene-wide lighting and atmosphere settings, shared by every backend.
#[derive(Debug, Clone, Copy)]
pub struct SceneSettings {
    /// World-space distance at which fog fully swallows geometry.
    pub fog_range: f32,
    pub fog_color: [f32; 4],
    pub clear_color: [f32; 4],
    /// Direction the sun shines along (towards the ground), normalized by
    /// the backend before use.
    pub light_direction: Vec3,
    pub light_diffuse: [f32; 3],
    pub ambient: [f32; 3],
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            fog_range: 250.0,
            fog_color: [0.55, 0.68, 0.83, 1.0],
            clear_color: [0.55, 0.68, 0.83, 1.0],
            light_direction: Vec3::new(-0.4, -1.0, -0.3),
            light_diffuse: [1.0, 0.98, 0.92],
            ambient: [0.35, 0.35, 0.38],
        }
    }
}
