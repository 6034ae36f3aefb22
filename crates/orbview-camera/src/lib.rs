pub mod controls;

pub use controls::OrbitControls;

use glam::{Mat4, Vec3};

/// Perspective camera looking at a point.
///
/// The projection matrix is cached: changing `fov_y_degrees`, `aspect`,
/// `near` or `far` has no effect on [`PerspectiveCamera::projection_matrix`]
/// until [`PerspectiveCamera::update_projection_matrix`] is called.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            fov_y_degrees,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        let aspect = if self.aspect.is_finite() && self.aspect > 0.0 {
            self.aspect
        } else {
            1.0
        };
        self.projection =
            Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect, self.near, self.far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.look_at, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// Unit vector from the eye towards the look-at point.
    pub fn forward(&self) -> Vec3 {
        (self.look_at - self.position)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    (width.max(1) as f32) / (height.max(1) as f32)
}
