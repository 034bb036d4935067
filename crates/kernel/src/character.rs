//! Per-tick character locomotion.
//!
//! Characters are upright capsules whose rotation is locked in the physics
//! world. The controller owns their horizontal velocity and facing; gravity
//! and contacts own the vertical axis.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tickwell_common::{slerp, yaw_from_direction};
use tickwell_ecs::CharacterData;
use tickwell_physics::{BodyHandle, LayerMask, ObjectLayer, PhysicsWorld, Ray, RayFilter};

/// Steepest surface, as the y component of its normal, that counts as ground.
const GROUND_NORMAL_MIN_Y: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Horizontal speed at full input, metres per second.
    pub move_speed: f32,
    pub sprint_multiplier: f32,
    /// Approach rate toward the target velocity while input is held.
    pub acceleration: f32,
    /// Approach rate toward rest once input is released.
    pub deceleration: f32,
    /// Slerp rate toward the movement heading, per second.
    pub turn_rate: f32,
    pub jump_speed: f32,
    /// How far below the feet the ground probe reaches.
    pub ground_probe_distance: f32,
    pub radius: f32,
    pub half_height: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sprint_multiplier: 1.75,
            acceleration: 10.0,
            deceleration: 8.0,
            turn_rate: 10.0,
            jump_speed: 5.0,
            ground_probe_distance: 0.15,
            radius: 0.35,
            half_height: 0.5,
        }
    }
}

/// What happened to one character during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterStep {
    pub grounded: bool,
    pub jumped: bool,
}

#[derive(Debug, Clone)]
pub struct CharacterController {
    config: CharacterConfig,
}

impl CharacterController {
    pub fn new(config: CharacterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    /// Cast down from the capsule center; ground is any walkable surface
    /// within `ground_probe_distance` of the feet. Debris is ignored.
    pub fn probe_ground(&self, physics: &PhysicsWorld, body: BodyHandle, data: &CharacterData) -> bool {
        let reach = data.foot_offset() + self.config.ground_probe_distance;
        let ray = Ray::new(physics.position(body), Vec3::NEG_Y, reach);
        let filter = RayFilter::default()
            .excluding(body)
            .with_layers(LayerMask::ALL.without(ObjectLayer::Debris));
        physics
            .cast_ray(ray, filter)
            .is_some_and(|hit| hit.normal.y >= GROUND_NORMAL_MIN_Y)
    }

    /// Drive one character for one tick. Reads `desired_direction` and
    /// `sprinting` from `data`; writes `grounded` and `facing` back.
    pub fn update(
        &self,
        physics: &mut PhysicsWorld,
        body: BodyHandle,
        data: &mut CharacterData,
        jump: bool,
        dt: f32,
    ) -> CharacterStep {
        let cfg = &self.config;
        data.grounded = self.probe_ground(physics, body, data);

        let direction = planar(data.desired_direction);
        let has_input = direction != Vec3::ZERO;

        let speed = if data.sprinting {
            cfg.move_speed * cfg.sprint_multiplier
        } else {
            cfg.move_speed
        };
        let target = direction * speed;
        let rate = if has_input { cfg.acceleration } else { cfg.deceleration };
        let factor = (rate * dt).min(1.0);

        let velocity = physics.linear_velocity(body);
        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z).lerp(target, factor);
        let mut vertical = velocity.y;

        let jumped = jump && data.grounded;
        if jumped {
            vertical = cfg.jump_speed;
            data.grounded = false;
        }
        physics.set_linear_velocity(body, Vec3::new(horizontal.x, vertical, horizontal.z));

        if has_input {
            let heading = Quat::from_rotation_y(yaw_from_direction(direction));
            data.facing = slerp(data.facing, heading, (cfg.turn_rate * dt).min(1.0));
        }
        physics.set_angular_velocity(body, Vec3::ZERO);
        physics.set_rotation(body, data.facing);

        CharacterStep {
            grounded: data.grounded,
            jumped,
        }
    }
}

/// Horizontal part of `v`, clamped to unit length.
fn planar(v: Vec3) -> Vec3 {
    let flat = Vec3::new(v.x, 0.0, v.z);
    if !flat.is_finite() || flat.length_squared() < 1e-8 {
        Vec3::ZERO
    } else if flat.length_squared() > 1.0 {
        flat.normalize()
    } else {
        flat
    }
}
