//! Ray queries against the bodies of a [`PhysicsWorld`].

use glam::{Quat, Vec3};

use crate::body::BodyHandle;
use crate::layers::{LayerMask, ObjectLayer};
use crate::shape::Shape;
use crate::world::PhysicsWorld;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
    pub max_distance: f32,
}

impl Ray {
    /// A zero direction yields a ray that hits nothing.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        }
    }
}

/// Which bodies a ray may hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayFilter {
    pub layers: LayerMask,
    pub exclude: Option<BodyHandle>,
}

impl Default for RayFilter {
    fn default() -> Self {
        Self {
            layers: LayerMask::ALL,
            exclude: None,
        }
    }
}

impl RayFilter {
    pub fn excluding(mut self, body: BodyHandle) -> Self {
        self.exclude = Some(body);
        self
    }

    pub fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyHandle,
    pub layer: ObjectLayer,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl PhysicsWorld {
    /// Closest hit along the ray, if any.
    pub fn cast_ray(&self, ray: Ray, filter: RayFilter) -> Option<RayHit> {
        if ray.direction == Vec3::ZERO {
            return None;
        }
        let mut best: Option<RayHit> = None;
        for (handle, body) in self.bodies() {
            if filter.exclude == Some(handle) || !filter.layers.contains(body.layer) {
                continue;
            }
            let limit = best.map_or(ray.max_distance, |b| b.distance);
            let hit = match body.shape {
                Shape::Sphere { radius } => ray_sphere(ray.origin, ray.direction, body.position, radius),
                Shape::Box { half_extents } => {
                    ray_box(ray.origin, ray.direction, body.position, body.rotation, half_extents, limit)
                }
                Shape::Capsule {
                    radius,
                    half_height,
                } => ray_capsule(ray.origin, ray.direction, body.position, body.rotation, radius, half_height),
            };
            if let Some((distance, normal)) = hit {
                if distance <= limit {
                    best = Some(RayHit {
                        body: handle,
                        layer: body.layer,
                        distance,
                        point: ray.origin + ray.direction * distance,
                        normal,
                    });
                }
            }
        }
        best
    }
}

/// Entry distance and outward normal. A ray starting inside reports
/// distance zero and a normal facing back along the ray.
fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some((0.0, -dir));
    }
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    let normal = (origin + dir * t - center).normalize_or_zero();
    Some((t.max(0.0), normal))
}

fn ray_box(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    rotation: Quat,
    half: Vec3,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let inv = rotation.conjugate();
    let o = inv * (origin - center);
    let d = inv * dir;
    let mut t_min = 0.0f32;
    let mut t_max = max_distance;
    let mut entry_normal = None;
    for axis in 0..3 {
        if d[axis].abs() < 1e-8 {
            if o[axis] < -half[axis] || o[axis] > half[axis] {
                return None;
            }
            continue;
        }
        let inv_d = d[axis].recip();
        let mut t1 = (-half[axis] - o[axis]) * inv_d;
        let mut t2 = (half[axis] - o[axis]) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            let mut n = Vec3::ZERO;
            n[axis] = -d[axis].signum();
            entry_normal = Some(n);
        }
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    let normal = entry_normal.map_or(-dir, |n| rotation * n);
    Some((t_min, normal))
}

fn ray_capsule(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    rotation: Quat,
    radius: f32,
    half_height: f32,
) -> Option<(f32, Vec3)> {
    let axis = rotation * Vec3::Y;
    let mut best = ray_sphere(origin, dir, center - axis * half_height, radius);
    let top = ray_sphere(origin, dir, center + axis * half_height, radius);
    if let Some(t) = top {
        if best.is_none_or(|b| t.0 < b.0) {
            best = Some(t);
        }
    }

    // Cylindrical side in capsule-local space.
    let inv = rotation.conjugate();
    let o = inv * (origin - center);
    let d = inv * dir;
    let a = d.x * d.x + d.z * d.z;
    if a > 1e-12 {
        let b = o.x * d.x + o.z * d.z;
        let c = o.x * o.x + o.z * o.z - radius * radius;
        let disc = b * b - a * c;
        if disc >= 0.0 {
            let t = ((-b - disc.sqrt()) / a).max(0.0);
            let y = o.y + d.y * t;
            if y.abs() <= half_height && best.is_none_or(|b| t < b.0) {
                let p = o + d * t;
                let normal = rotation * Vec3::new(p.x, 0.0, p.z).normalize_or_zero();
                best = Some((t, normal));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::layers::LayerTable;
    use crate::world::PhysicsConfig;
    use tickwell_common::Pose;

    fn world_with_ground() -> (PhysicsWorld, BodyHandle) {
        let mut w = PhysicsWorld::new(PhysicsConfig::default(), LayerTable::default());
        let ground = w
            .create_body(BodyDesc::fixed(
                Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
                Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
            ))
            .unwrap();
        (w, ground)
    }

    #[test]
    fn downward_ray_hits_ground_top() {
        let (w, ground) = world_with_ground();
        let hit = w
            .cast_ray(Ray::new(Vec3::new(1.0, 2.0, 1.0), -Vec3::Y, 5.0), RayFilter::default())
            .unwrap();
        assert_eq!(hit.body, ground);
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert!(hit.normal.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn ray_respects_max_distance() {
        let (w, _) = world_with_ground();
        assert!(w
            .cast_ray(Ray::new(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y, 1.5), RayFilter::default())
            .is_none());
    }

    #[test]
    fn ray_filter_excludes_body_and_layers() {
        let (mut w, ground) = world_with_ground();
        let ball = w
            .create_body(BodyDesc::dynamic(Shape::sphere(0.5), Pose::from_position(Vec3::new(0.0, 1.0, 0.0))))
            .unwrap();
        let ray = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Y, 10.0);

        let hit = w.cast_ray(ray, RayFilter::default()).unwrap();
        assert_eq!(hit.body, ball);
        assert!((hit.distance - 1.5).abs() < 1e-5);

        let hit = w.cast_ray(ray, RayFilter::default().excluding(ball)).unwrap();
        assert_eq!(hit.body, ground);

        let only_dynamic = LayerMask::NONE.with(ObjectLayer::Dynamic);
        let hit = w
            .cast_ray(Ray::new(Vec3::new(5.0, 3.0, 0.0), -Vec3::Y, 10.0), RayFilter::default().with_layers(only_dynamic));
        assert!(hit.is_none());
    }

    #[test]
    fn ray_hits_capsule_side_and_cap() {
        let (side, _) = ray_capsule(
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::X,
            Vec3::ZERO,
            Quat::IDENTITY,
            0.5,
            1.0,
        )
        .unwrap();
        assert!((side - 4.5).abs() < 1e-5);
        let (cap, normal) = ray_capsule(
            Vec3::new(0.0, 5.0, 0.0),
            -Vec3::Y,
            Vec3::ZERO,
            Quat::IDENTITY,
            0.5,
            1.0,
        )
        .unwrap();
        assert!((cap - 3.5).abs() < 1e-5);
        assert!(normal.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn zero_direction_hits_nothing() {
        let (w, _) = world_with_ground();
        assert!(w.cast_ray(Ray::new(Vec3::ZERO, Vec3::ZERO, 10.0), RayFilter::default()).is_none());
    }
}
