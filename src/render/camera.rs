use crate::config::{CameraConfig, OrbitConfig};
use crate::render::pick::Ray;
use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Polar angle is kept this far away from the poles.
const POLE_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy)]
pub struct PerspectiveCamera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            fov_y: config.fov_y_deg.to_radians(),
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.target - self.eye;
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-10 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.eye, self.target, up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// World-space ray through a point in normalized device coordinates.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection().inverse();
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(near, far - near)
    }
}

/// Orbit/zoom around a fixed target with damped inertia.
#[derive(Debug, Clone)]
pub struct OrbitCameraRig {
    target: Vec3,
    radius: f32,
    /// Azimuth around +Y, measured from +Z towards +X.
    theta: f32,
    /// Polar angle from +Y.
    phi: f32,
    delta_theta: f32,
    delta_phi: f32,
    zoom_scale: f32,
    min_distance: f32,
    max_distance: f32,
    drag_anchor: Option<Vec2>,
    config: OrbitConfig,
}

impl OrbitCameraRig {
    pub fn new(config: OrbitConfig) -> Self {
        let mut rig = Self {
            target: Vec3::ZERO,
            radius: 5.0,
            theta: 0.0,
            phi: PI / 2.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            zoom_scale: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            drag_anchor: None,
            config,
        };
        rig.frame(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        rig
    }

    /// Places the camera at `eye` looking at `target`; zoom bounds scale with
    /// that distance.
    pub fn frame(&mut self, eye: Vec3, target: Vec3) {
        let offset = eye - target;
        let radius = offset.length().max(1e-4);
        self.target = target;
        self.radius = radius;
        self.theta = offset.x.atan2(offset.z);
        self.phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
        self.phi = self.phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);
        self.min_distance = radius * self.config.min_distance_factor;
        self.max_distance = radius * self.config.max_distance_factor;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.zoom_scale = 1.0;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn begin_drag(&mut self, pointer_px: Vec2) {
        self.drag_anchor = Some(pointer_px);
    }

    /// Converts pointer travel to orbit angles; a full viewport height is one turn.
    pub fn drag_to(&mut self, pointer_px: Vec2, viewport_height: f32) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        if viewport_height <= 0.0 {
            return;
        }
        let delta = pointer_px - anchor;
        let per_pixel = TAU / viewport_height * self.config.rotate_speed;
        self.delta_theta -= delta.x * per_pixel;
        self.delta_phi -= delta.y * per_pixel;
        self.drag_anchor = Some(pointer_px);
    }

    /// Ends the gesture; remaining angular velocity decays in `update`.
    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// Positive `steps` zooms in.
    pub fn zoom(&mut self, steps: f32) {
        if steps.is_finite() {
            self.zoom_scale *= 0.95f32.powf(self.config.zoom_speed * steps);
        }
    }

    /// Advances damping by one tick. Returns true while still in motion.
    pub fn update(&mut self) -> bool {
        let damping = self.config.damping;
        self.theta += self.delta_theta * damping;
        self.phi = (self.phi + self.delta_phi * damping).clamp(POLE_EPSILON, PI - POLE_EPSILON);
        self.theta = wrap_angle(self.theta);
        let zoomed = self.radius * self.zoom_scale;
        if !zoomed.is_nan() {
            self.radius = zoomed.clamp(self.min_distance, self.max_distance);
        }
        self.zoom_scale = 1.0;
        self.delta_theta *= 1.0 - damping;
        self.delta_phi *= 1.0 - damping;
        self.delta_theta.abs() > 1e-6 || self.delta_phi.abs() > 1e-6
    }

    pub fn eye(&self) -> Vec3 {
        let sin_phi = self.phi.sin();
        self.target
            + Vec3::new(
                self.radius * sin_phi * self.theta.sin(),
                self.radius * self.phi.cos(),
                self.radius * sin_phi * self.theta.cos(),
            )
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    /// Furthest the current framing allows zooming out.
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.eye = self.eye();
        camera.target = self.target;
    }
}

/// Wraps to (-π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> OrbitCameraRig {
        OrbitCameraRig::new(OrbitConfig::default())
    }

    #[test]
    fn top_down_framing_stays_finite() {
        let mut rig = rig();
        rig.frame(Vec3::new(0.0, 20.0, 0.0), Vec3::ZERO);
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        rig.apply(&mut camera);
        assert!(camera.eye.is_finite());
        assert!((camera.eye.length() - 20.0).abs() < 1e-3);
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn frame_preserves_eye_position() {
        let mut rig = rig();
        let eye = Vec3::new(3.0, 4.0, 12.0);
        rig.frame(eye, Vec3::ZERO);
        assert!((rig.eye() - eye).length() < 1e-4);
    }

    #[test]
    fn drag_orbits_at_constant_distance() {
        let mut rig = rig();
        rig.frame(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        rig.begin_drag(Vec2::new(100.0, 100.0));
        rig.drag_to(Vec2::new(160.0, 80.0), 400.0);
        rig.end_drag();
        for _ in 0..10 {
            rig.update();
        }
        assert!((rig.eye().length() - 10.0).abs() < 1e-3);
        assert!((rig.eye() - Vec3::new(0.0, 0.0, 10.0)).length() > 0.1);
    }

    #[test]
    fn inertia_continues_then_settles() {
        let mut rig = rig();
        rig.frame(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        rig.begin_drag(Vec2::ZERO);
        rig.drag_to(Vec2::new(40.0, 0.0), 400.0);
        rig.end_drag();

        let before = rig.eye();
        assert!(rig.update());
        let first = rig.eye();
        assert!(rig.update());
        let second = rig.eye();
        assert!(first != before && second != first);

        for _ in 0..200 {
            rig.update();
        }
        assert!(!rig.update());
    }

    #[test]
    fn zoom_is_clamped_to_bounds() {
        let mut rig = rig();
        rig.frame(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        rig.zoom(1000.0);
        rig.update();
        assert!((rig.distance() - 2.5).abs() < 1e-4);
        rig.zoom(-5000.0);
        rig.update();
        assert!((rig.distance() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn drag_without_anchor_is_ignored() {
        let mut rig = rig();
        rig.drag_to(Vec2::new(50.0, 50.0), 400.0);
        assert!(!rig.update());
    }

    #[test]
    fn center_ray_points_at_target() {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        let ray = camera.ray_through(Vec2::ZERO);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((ray.origin.z - 4.9).abs() < 1e-2);
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(TAU + 0.25) - 0.25).abs() < 1e-5);
    }
}
