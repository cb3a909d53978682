use glam::{Mat4, UVec2, Vec3};

/// Free-flight camera used by both the desktop client and headless flights.
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(8.0, 40.0, 8.0),
            yaw: -90.0_f32.to_radians(),
            pitch: -20.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            speed: 20.0,
            sensitivity: 0.003,
        }
    }
}

impl FlyCamera {
    /// View direction derived from yaw and pitch.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Move along camera-local axes: `wish.x` strafes, `wish.y` moves along
    /// world up, `wish.z` follows the view direction. The wish vector is
    /// normalized so diagonal flight is not faster.
    pub fn fly(&mut self, wish: Vec3, dt: f32) {
        if wish == Vec3::ZERO {
            return;
        }
        let step = wish.normalize() * self.speed * dt;
        self.position += self.right() * step.x + Vec3::Y * step.y + self.forward() * step.z;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn set_aspect(&mut self, dimension: UVec2) {
        self.aspect = dimension.x as f32 / dimension.y.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_valid() {
        let cam = FlyCamera::default();
        assert!(cam.position.y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn flight_follows_the_view_direction() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        cam.fly(Vec3::Z, 1.0);
        let moved = cam.position - start;
        assert!(moved.dot(cam.forward()) > 0.0);
        assert!((moved.length() - cam.speed).abs() < 1.0e-3);
    }

    #[test]
    fn diagonal_flight_is_not_faster() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        cam.fly(Vec3::new(1.0, 0.0, 1.0), 1.0);
        let moved = (cam.position - start).length();
        assert!((moved - cam.speed).abs() < 1.0e-3);
    }

    #[test]
    fn zero_wish_is_a_no_op() {
        let mut cam = FlyCamera::default();
        let start = cam.position;
        cam.fly(Vec3::ZERO, 1.0);
        assert_eq!(cam.position, start);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FlyCamera::default();
        cam.rotate(0.0, -1.0e6);
        assert!(cam.pitch <= 89.0_f32.to_radians());
        assert!(!cam.forward().x.is_nan());
    }

    #[test]
    fn aspect_tracks_surface_dimension() {
        let mut cam = FlyCamera::default();
        cam.set_aspect(UVec2::new(1920, 1080));
        assert!((cam.aspect - 16.0 / 9.0).abs() < 1.0e-4);
        cam.set_aspect(UVec2::new(800, 0));
        assert!(cam.aspect.is_finite());
    }
}
