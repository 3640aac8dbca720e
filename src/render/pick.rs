//! CPU ray casting against model geometry.
//!
//! A press ray from the camera is moved into the model's local space once
//! and tested against each mesh: a slab test on the mesh bounds rejects
//! misses early, then every triangle is tested with Möller–Trumbore.
//! Both faces of a triangle count as hits.

use crate::assets::ModelAsset;
use crate::scene::BoundingBox;
use glam::{Mat4, Vec3};

const PARALLEL_EPSILON: f32 = 1e-7;
const MIN_DISTANCE: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    pub fn transformed(&self, matrix: Mat4) -> Self {
        Self::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }

    /// Entry distance into `bounds`, or `None` when the ray misses it.
    pub fn intersect_bounds(&self, bounds: &BoundingBox) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let dir = self.direction[axis];
            let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
            if dir.abs() < PARALLEL_EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let (mut t0, mut t1) = ((lo - origin) * inv, (hi - origin) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }

    /// Möller–Trumbore intersection; returns the distance along the ray.
    pub fn intersect_triangle(&self, [v0, v1, v2]: [Vec3; 3]) -> Option<f32> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let h = self.direction.cross(edge2);
        let a = edge1.dot(h);
        if a.abs() < PARALLEL_EPSILON * edge1.length() * edge2.length() {
            return None;
        }
        let f = 1.0 / a;
        let s = self.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * self.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = f * edge2.dot(q);
        (t > MIN_DISTANCE).then_some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub mesh_index: usize,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

/// Nearest intersection of a world-space `ray` with `asset` placed by `model`.
pub fn pick_model(ray: &Ray, asset: &ModelAsset, model: Mat4) -> Option<PickHit> {
    let inverse = model.inverse();
    if !inverse.is_finite() {
        return None;
    }
    let local = ray.transformed(inverse);
    if local.direction == Vec3::ZERO {
        return None;
    }

    let mut nearest: Option<(usize, f32)> = None;
    for (mesh_index, mesh) in asset.meshes.iter().enumerate() {
        let Some(bounds) = mesh.bounds() else {
            continue;
        };
        let Some(entry) = local.intersect_bounds(&bounds) else {
            continue;
        };
        if nearest.is_some_and(|(_, best)| entry > best) {
            continue;
        }
        for triangle in mesh.triangles() {
            if let Some(t) = local.intersect_triangle(triangle) {
                if nearest.map_or(true, |(_, best)| t < best) {
                    nearest = Some((mesh_index, t));
                }
            }
        }
    }

    nearest.map(|(mesh_index, t)| {
        let point = model.transform_point3(local.at(t));
        PickHit {
            mesh_index,
            distance: (point - ray.origin).length(),
            point,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::viewport::ViewportSize;
    use crate::assets::tests::{cube_asset, unit_cube_asset};
    use crate::config::{CameraConfig, PresentationMode};
    use crate::render::camera::PerspectiveCamera;
    use crate::scene::compose;
    use glam::Vec2;

    fn triangle() -> [Vec3; 3] {
        [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn triangle_hit_and_miss() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!((ray.intersect_triangle(triangle()).unwrap() - 5.0).abs() < 1e-5);

        let beside = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(beside.intersect_triangle(triangle()), None);

        let behind = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::NEG_Z);
        assert_eq!(behind.intersect_triangle(triangle()), None);

        let parallel = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X);
        assert_eq!(parallel.intersect_triangle(triangle()), None);
    }

    #[test]
    fn bounds_slab_test() {
        let bounds = BoundingBox {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        assert!((ray.intersect_bounds(&bounds).unwrap() - 9.0).abs() < 1e-5);
        let miss = Ray::new(Vec3::new(2.0, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(miss.intersect_bounds(&bounds), None);
        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(inside.intersect_bounds(&bounds), Some(0.0));
    }

    #[test]
    fn nearest_mesh_wins() {
        let mut asset = cube_asset([0.0, 0.0, 0.0], 1.0, "Back");
        let front = cube_asset([0.0, 0.0, 3.0], 1.0, "Front");
        asset.meshes.extend(front.meshes);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 10.0), Vec3::NEG_Z);
        let hit = pick_model(&ray, &asset, Mat4::IDENTITY).unwrap();
        assert_eq!(hit.mesh_index, 1);
        assert!((hit.distance - 6.0).abs() < 1e-4);
    }

    #[test]
    fn screen_pick_inside_and_outside_silhouette() {
        let asset = unit_cube_asset("Body");
        let composition = compose(
            &asset,
            ViewportSize::new(600, 400),
            0.6,
            PresentationMode::Interactive,
        )
        .unwrap();
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        camera.eye = composition.eye;
        camera.target = Vec3::ZERO;
        let model = composition.transform.matrix();

        let center = camera.ray_through(Vec2::ZERO);
        let hit = pick_model(&center, &asset, model).expect("centre of the model");
        assert!(hit.distance > 0.0 && hit.distance < composition.eye.length());

        let corner = camera.ray_through(Vec2::new(0.98, 0.98));
        assert_eq!(pick_model(&corner, &asset, model), None);
    }
}
