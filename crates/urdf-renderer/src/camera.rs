//! Orbit camera with damped rotate, pan and zoom

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};

use urdf_core::{BoundingBox, Ray, UpAxis};

/// Camera uniform buffer data (80 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Eye position, w unused
    pub eye: [f32; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            eye: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Keeps the polar angle away from the poles
const POLAR_EPSILON: f32 = 1e-4;
/// Pending motion below this is dropped
const MOTION_EPSILON: f32 = 1e-6;

/// Perspective camera orbiting a target point.
///
/// Input accumulates into pending deltas; [`OrbitCamera::update`] applies
/// them once per frame and decays them by the damping factor.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    /// Radians per pixel of drag
    pub rotate_speed: f32,

    /// (azimuth, polar) still to apply
    rotate_delta: Vec2,
    pan_delta: Vec3,
    zoom_scale: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(UpAxis::Z)
    }
}

impl OrbitCamera {
    pub const DEFAULT_FOV: f32 = 45.0;
    pub const DEFAULT_NEAR: f32 = 0.01;
    pub const DEFAULT_FAR: f32 = 2000.0;
    pub const DEFAULT_DAMPING: f32 = 0.08;

    pub fn new(up: UpAxis) -> Self {
        Self {
            position: Vec3::splat(2.0),
            target: Vec3::ZERO,
            up: up_vector(up),
            fov_y: Self::DEFAULT_FOV,
            near: Self::DEFAULT_NEAR,
            far: Self::DEFAULT_FAR,
            aspect: 1.0,
            enable_damping: true,
            damping_factor: Self::DEFAULT_DAMPING,
            rotate_speed: 0.005,
            rotate_delta: Vec2::ZERO,
            pan_delta: Vec3::ZERO,
            zoom_scale: 1.0,
        }
    }

    pub fn set_up_axis(&mut self, up: UpAxis) {
        self.up = up_vector(up);
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Queue a rotation from a pointer drag, in pixels
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.rotate_delta += Vec2::new(-dx, -dy) * self.rotate_speed;
    }

    /// Queue a pan from a pointer drag, in pixels of a viewport `viewport_height` tall
    pub fn pan(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let forward = (self.target - self.position).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let cam_up = right.cross(forward);

        // World units per pixel at the target distance
        let half_height = self.distance() * (self.fov_y.to_radians() / 2.0).tan();
        let scale = 2.0 * half_height / viewport_height.max(1.0);
        self.pan_delta += (-right * dx + cam_up * dy) * scale;
    }

    /// Queue a zoom; positive `steps` move closer
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_scale *= 0.95f32.powf(steps);
    }

    /// Apply pending motion. Returns true if the camera moved.
    pub fn update(&mut self) -> bool {
        let moving = self.rotate_delta.length_squared() > MOTION_EPSILON * MOTION_EPSILON
            || self.pan_delta.length_squared() > MOTION_EPSILON * MOTION_EPSILON
            || (self.zoom_scale - 1.0).abs() > MOTION_EPSILON;
        if !moving {
            self.rotate_delta = Vec2::ZERO;
            self.pan_delta = Vec3::ZERO;
            self.zoom_scale = 1.0;
            return false;
        }

        // Work in a frame where `up` is +Y
        let to_y_up = Quat::from_rotation_arc(self.up.normalize(), Vec3::Y);
        let offset = to_y_up * (self.position - self.target);

        let radius = offset.length().max(MOTION_EPSILON);
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.rotate_delta.x;
        phi = (phi + self.rotate_delta.y).clamp(POLAR_EPSILON, std::f32::consts::PI - POLAR_EPSILON);
        let radius = radius * self.zoom_scale;

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );

        self.target += self.pan_delta;
        self.position = self.target + to_y_up.inverse() * offset;

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.rotate_delta *= keep;
            self.pan_delta *= keep;
        } else {
            self.rotate_delta = Vec2::ZERO;
            self.pan_delta = Vec3::ZERO;
        }
        self.zoom_scale = 1.0;
        true
    }

    /// Stop any motion still in flight
    pub fn stop(&mut self) {
        self.rotate_delta = Vec2::ZERO;
        self.pan_delta = Vec3::ZERO;
        self.zoom_scale = 1.0;
    }

    /// Place the camera at `(d, d, d)` looking at the origin
    pub fn reset_distance(&mut self, distance: f32) {
        self.stop();
        self.target = Vec3::ZERO;
        self.position = Vec3::splat(distance);
    }

    /// Frame `bounds`: target its centre from `1.8 ×` its largest dimension,
    /// and rescale the clip planes to the model size. Empty bounds are ignored.
    pub fn fit_to_bounds(&mut self, bounds: &BoundingBox) -> bool {
        if bounds.is_empty() {
            return false;
        }
        let center = bounds.center();
        let max_dim = match bounds.max_dimension() {
            d if d > 0.0 => d,
            _ => 1.0,
        };

        self.near = (max_dim / 1000.0).max(0.001);
        self.far = (max_dim * 1000.0).max(1000.0);

        let dist = max_dim * 1.8;
        self.stop();
        self.target = center;
        self.position = center + Vec3::new(dist, dist * 0.9, dist);
        true
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    /// Ray through a point of a `width` × `height` viewport, measured from its top-left
    pub fn screen_to_ray(&self, x: f32, y: f32, width: f32, height: f32) -> Ray {
        let ndc_x = 2.0 * x / width.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * y / height.max(1.0);

        let inv = (self.projection_matrix() * self.view_matrix()).inverse();
        let near = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        Ray::new(near, far - near)
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: (self.projection_matrix() * self.view_matrix()).to_cols_array_2d(),
            eye: self.position.extend(1.0).to_array(),
        }
    }
}

pub fn up_vector(up: UpAxis) -> Vec3 {
    match up {
        UpAxis::Z => Vec3::Z,
        UpAxis::Y => Vec3::Y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let camera = OrbitCamera::default();
        assert_eq!(camera.position, Vec3::splat(2.0));
        assert_eq!(camera.up, Vec3::Z);
        assert_eq!(camera.fov_y, 45.0);
        assert_eq!(camera.near, 0.01);
        assert_eq!(camera.far, 2000.0);
        assert_eq!(camera.damping_factor, 0.08);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = OrbitCamera::new(UpAxis::Y);
        let before = camera.distance();
        camera.orbit(100.0, 20.0);
        assert!(camera.update());
        assert_relative_eq!(camera.distance(), before, epsilon = 1e-4);
        assert_ne!(camera.position, Vec3::splat(2.0));
    }

    #[test]
    fn test_damping_decays_motion() {
        let mut camera = OrbitCamera::new(UpAxis::Z);
        camera.orbit(50.0, 0.0);
        camera.update();
        let first = camera.position;
        camera.update();
        // still drifting after the input frame
        assert_ne!(camera.position, first);

        let mut frames = 0;
        while camera.update() {
            frames += 1;
            assert!(frames < 1000);
        }
    }

    #[test]
    fn test_zoom_and_pan() {
        let mut camera = OrbitCamera::new(UpAxis::Z);
        camera.enable_damping = false;
        camera.zoom(1.0);
        camera.update();
        assert_relative_eq!(camera.distance(), Vec3::splat(2.0).length() * 0.95, epsilon = 1e-4);

        camera.pan(10.0, 0.0, 600.0);
        camera.update();
        assert_ne!(camera.target, Vec3::ZERO);
        assert!(!camera.update());
    }

    #[test]
    fn test_reset_distance() {
        let mut camera = OrbitCamera::default();
        camera.target = Vec3::ONE;
        camera.reset_distance(0.5);
        assert_eq!(camera.position, Vec3::splat(0.5));
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_fit_to_bounds() {
        let mut camera = OrbitCamera::default();
        let bounds = BoundingBox::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 4.0));
        assert!(camera.fit_to_bounds(&bounds));
        assert_eq!(camera.target, Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(camera.position.x, 7.2, epsilon = 1e-5);
        assert_relative_eq!(camera.position.y, 6.48, epsilon = 1e-5);
        assert_relative_eq!(camera.near, 0.004);
        assert_relative_eq!(camera.far, 4000.0);

        assert!(!camera.fit_to_bounds(&BoundingBox::empty()));
    }

    #[test]
    fn test_screen_to_ray() {
        let mut camera = OrbitCamera::default();
        camera.set_aspect(800, 400);

        let center = camera.screen_to_ray(400.0, 200.0, 800.0, 400.0);
        let forward = (camera.target - camera.position).normalize();
        assert_relative_eq!(center.direction.dot(forward), 1.0, epsilon = 1e-4);
        assert!((center.origin - camera.position).length() < 0.05);

        // top edge tilts up by half the vertical field of view
        let top = camera.screen_to_ray(400.0, 0.0, 800.0, 400.0);
        let angle = top.direction.dot(forward).acos().to_degrees();
        assert_relative_eq!(angle, camera.fov_y / 2.0, epsilon = 0.1);
        assert!(top.direction.dot(camera.up) > center.direction.dot(camera.up));

        // left half of the screen points left
        let right = forward.cross(camera.up);
        let left = camera.screen_to_ray(100.0, 200.0, 800.0, 400.0);
        assert!(left.direction.dot(right) < 0.0);
    }

    #[test]
    fn test_uniform_projects_target_to_center() {
        let camera = OrbitCamera::default();
        let uniform = camera.uniform();
        let m = Mat4::from_cols_array_2d(&uniform.view_proj);
        let clip = m * camera.target.extend(1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        assert_eq!(uniform.eye, [2.0, 2.0, 2.0, 1.0]);
    }
}
