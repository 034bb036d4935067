use std::f32::consts::PI;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Collision shape, centered on the body origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// Capsule along the local Y axis. `half_height` excludes the caps.
    Capsule { radius: f32, half_height: f32 },
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Shape::Box { half_extents }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Shape::Capsule {
            radius,
            half_height,
        }
    }

    pub fn validate(&self) -> Result<(), PhysicsError> {
        let ok = match *self {
            Shape::Sphere { radius } => radius.is_finite() && radius > 0.0,
            Shape::Box { half_extents } => {
                half_extents.is_finite() && half_extents.min_element() > 0.0
            }
            Shape::Capsule {
                radius,
                half_height,
            } => radius.is_finite() && radius > 0.0 && half_height.is_finite() && half_height >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(PhysicsError::InvalidShape(format!("{self:?}")))
        }
    }

    pub fn volume(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Shape::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            Shape::Capsule {
                radius,
                half_height,
            } => PI * radius * radius * (2.0 * half_height) + 4.0 / 3.0 * PI * radius.powi(3),
        }
    }

    /// Principal moments of inertia for a body of `mass`.
    pub(crate) fn inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Shape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            Shape::Box { half_extents: h } => {
                let sq = h * h;
                Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 3.0)
            }
            // Solid cylinder spanning the full capsule length.
            Shape::Capsule {
                radius,
                half_height,
            } => {
                let len = 2.0 * (half_height + radius);
                let across = mass / 12.0 * (3.0 * radius * radius + len * len);
                Vec3::new(across, 0.5 * mass * radius * radius, across)
            }
        }
    }

    pub fn aabb(&self, position: Vec3, rotation: Quat) -> Aabb {
        let extent = match *self {
            Shape::Sphere { radius } => Vec3::splat(radius),
            Shape::Box { half_extents } => Mat3::from_quat(rotation).abs() * half_extents,
            Shape::Capsule {
                radius,
                half_height,
            } => (rotation * Vec3::Y * half_height).abs() + Vec3::splat(radius),
        };
        Aabb {
            min: position - extent,
            max: position + extent,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}
