use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tickwell_common::Pose;

use crate::layers::ObjectLayer;
use crate::shape::Shape;

/// Opaque reference to a body owned by a [`PhysicsWorld`](crate::PhysicsWorld).
///
/// Generation-checked: a handle outlives its body only as a stale value, and
/// using a stale handle panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionType {
    /// Never moves; infinite mass.
    Static,
    /// Integrated every step under gravity and contacts.
    Dynamic,
}

/// Surface and damping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
        }
    }
}

/// Everything needed to create a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub shape: Shape,
    pub pose: Pose,
    pub motion: MotionType,
    pub layer: ObjectLayer,
    pub material: Material,
    /// Mass per unit volume; ignored for static bodies.
    pub density: f32,
    /// Zero inverse inertia: contacts never rotate the body.
    pub lock_rotation: bool,
}

impl BodyDesc {
    pub fn dynamic(shape: Shape, pose: Pose) -> Self {
        Self {
            shape,
            pose,
            motion: MotionType::Dynamic,
            layer: ObjectLayer::Dynamic,
            material: Material::default(),
            density: 1000.0,
            lock_rotation: false,
        }
    }

    pub fn fixed(shape: Shape, pose: Pose) -> Self {
        Self {
            motion: MotionType::Static,
            layer: ObjectLayer::Static,
            ..Self::dynamic(shape, pose)
        }
    }

    pub fn with_layer(mut self, layer: ObjectLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_locked_rotation(mut self) -> Self {
        self.lock_rotation = true;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Body {
    pub shape: Shape,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub motion: MotionType,
    pub layer: ObjectLayer,
    pub material: Material,
    pub inv_mass: f32,
    pub inv_inertia_local: Vec3,
}

impl Body {
    pub fn from_desc(desc: &BodyDesc) -> Self {
        let (inv_mass, inv_inertia_local) = match desc.motion {
            MotionType::Static => (0.0, Vec3::ZERO),
            MotionType::Dynamic => {
                let mass = desc.density * desc.shape.volume();
                let inv_inertia = if desc.lock_rotation {
                    Vec3::ZERO
                } else {
                    desc.shape.inertia(mass).recip()
                };
                (mass.recip(), inv_inertia)
            }
        };
        Self {
            shape: desc.shape,
            position: desc.pose.position,
            rotation: tickwell_common::normalize_quat(desc.pose.rotation),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            motion: desc.motion,
            layer: desc.layer,
            material: desc.material,
            inv_mass,
            inv_inertia_local,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.motion == MotionType::Dynamic
    }

    pub fn inv_inertia_world(&self) -> Mat3 {
        if self.inv_inertia_local == Vec3::ZERO {
            return Mat3::ZERO;
        }
        let r = Mat3::from_quat(self.rotation);
        r * Mat3::from_diagonal(self.inv_inertia_local) * r.transpose()
    }
}
