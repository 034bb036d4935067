//! The entity kinds the simulation knows about. Composition is fixed per
//! kind: each has its own extra row data and its own body recipe.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tickwell_common::{KindTag, Pose};
use tickwell_physics::{BodyDesc, Material, MotionType, ObjectLayer, Shape};

use crate::store::EntityKind;

/// Dynamic box that tumbles freely.
#[derive(Debug)]
pub struct CubeKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeData {
    pub half_extents: Vec3,
}

impl EntityKind for CubeKind {
    type Data = CubeData;
    const TAG: KindTag = KindTag::Cube;

    fn body_desc(pose: Pose, data: &CubeData) -> BodyDesc {
        BodyDesc::dynamic(Shape::cuboid(data.half_extents), pose).with_material(Material {
            friction: 0.6,
            restitution: 0.1,
            ..Material::default()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Player,
    Npc,
}

/// Upright capsule driven by the character controller.
#[derive(Debug)]
pub struct CharacterKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterData {
    pub archetype: Archetype,
    pub radius: f32,
    pub half_height: f32,
    /// Updated once per tick by the ground probe.
    pub grounded: bool,
    /// Yaw-only facing, written to the body by the controller.
    pub facing: Quat,
    /// World-space desired direction for the next tick; length at most one.
    pub desired_direction: Vec3,
    pub sprinting: bool,
}

impl CharacterData {
    pub fn new(archetype: Archetype, radius: f32, half_height: f32) -> Self {
        Self {
            archetype,
            radius,
            half_height,
            grounded: false,
            facing: Quat::IDENTITY,
            desired_direction: Vec3::ZERO,
            sprinting: false,
        }
    }

    /// Distance from the capsule center to its lowest point.
    pub fn foot_offset(&self) -> f32 {
        self.half_height + self.radius
    }
}

impl EntityKind for CharacterKind {
    type Data = CharacterData;
    const TAG: KindTag = KindTag::Character;

    fn body_desc(pose: Pose, data: &CharacterData) -> BodyDesc {
        // Rotation is locked; only the controller turns the body.
        let pose = Pose::new(pose.position, data.facing);
        BodyDesc::dynamic(Shape::capsule(data.radius, data.half_height), pose)
            .with_layer(ObjectLayer::Character)
            .with_locked_rotation()
            .with_material(Material {
                friction: 0.0,
                restitution: 0.0,
                linear_damping: 0.0,
                angular_damping: 0.0,
            })
    }
}

/// Level geometry and other props with an arbitrary shape.
#[derive(Debug)]
pub struct PropKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropData {
    pub shape: Shape,
    pub motion: MotionType,
    pub layer: ObjectLayer,
}

impl PropData {
    pub fn fixed(shape: Shape) -> Self {
        Self {
            shape,
            motion: MotionType::Static,
            layer: ObjectLayer::Static,
        }
    }

    pub fn debris(shape: Shape) -> Self {
        Self {
            shape,
            motion: MotionType::Dynamic,
            layer: ObjectLayer::Debris,
        }
    }
}

impl EntityKind for PropKind {
    type Data = PropData;
    const TAG: KindTag = KindTag::Prop;

    fn body_desc(pose: Pose, data: &PropData) -> BodyDesc {
        let desc = match data.motion {
            MotionType::Static => BodyDesc::fixed(data.shape, pose),
            MotionType::Dynamic => BodyDesc::dynamic(data.shape, pose),
        };
        desc.with_layer(data.layer)
    }
}
