use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tickwell_input::Bindings;
use tickwell_physics::PhysicsConfig;

use crate::character::CharacterConfig;
use crate::clock::{DEFAULT_MAX_FRAME_DELTA, TICK_DURATION};
use crate::error::ConfigError;

/// Layout of the default play area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Half width of the square ground slab; its top face sits at y = 0.
    pub ground_half_extent: f32,
    pub cube_half_extent: f32,
    /// Spawned cubes appear this far ahead of the player...
    pub cube_spawn_distance: f32,
    /// ...and this far above the player's center.
    pub cube_spawn_height: f32,
    pub npc_spawns: Vec<Vec3>,
    /// NPCs walk toward the player until this close.
    pub npc_follow_distance: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            ground_half_extent: 25.0,
            cube_half_extent: 0.5,
            cube_spawn_distance: 2.0,
            cube_spawn_height: 2.0,
            npc_spawns: Vec::new(),
            npc_follow_distance: 3.0,
        }
    }
}

/// Everything a [`Simulation`](crate::Simulation) is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Longest wall-clock frame the clock will catch up on, seconds.
    pub max_frame_delta: f64,
    pub physics: PhysicsConfig,
    pub character: CharacterConfig,
    pub bindings: Bindings,
    /// Radians of camera yaw per unit of mouse motion.
    pub look_sensitivity: f32,
    pub player_spawn: Vec3,
    pub arena: ArenaConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            physics: PhysicsConfig::default(),
            character: CharacterConfig::default(),
            bindings: Bindings::default(),
            look_sensitivity: 0.0025,
            player_spawn: Vec3::new(0.0, 1.0, 0.0),
            arena: ArenaConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, what: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid(what.to_string()))
            }
        }
        fn positive(v: f32) -> bool {
            v.is_finite() && v > 0.0
        }
        fn non_negative(v: f32) -> bool {
            v.is_finite() && v >= 0.0
        }

        check(
            self.max_frame_delta.is_finite() && self.max_frame_delta >= TICK_DURATION,
            "max_frame_delta must be at least one tick",
        )?;

        let p = &self.physics;
        check(p.gravity.is_finite(), "physics.gravity must be finite")?;
        check(p.solver_iterations > 0, "physics.solver_iterations must be positive")?;
        check(p.max_bodies > 0, "physics.max_bodies must be positive")?;
        check(p.max_contact_pairs > 0, "physics.max_contact_pairs must be positive")?;
        check(
            (0.0..=1.0).contains(&p.baumgarte),
            "physics.baumgarte must be in [0, 1]",
        )?;
        check(
            non_negative(p.linear_slop) && non_negative(p.speculative_distance),
            "physics slop and speculative distance must be non-negative",
        )?;

        let c = &self.character;
        check(positive(c.move_speed), "character.move_speed must be positive")?;
        check(
            c.sprint_multiplier.is_finite() && c.sprint_multiplier >= 1.0,
            "character.sprint_multiplier must be at least 1",
        )?;
        check(
            positive(c.acceleration) && positive(c.deceleration),
            "character acceleration and deceleration must be positive",
        )?;
        check(positive(c.turn_rate), "character.turn_rate must be positive")?;
        check(non_negative(c.jump_speed), "character.jump_speed must be non-negative")?;
        check(
            non_negative(c.ground_probe_distance),
            "character.ground_probe_distance must be non-negative",
        )?;
        check(
            positive(c.radius) && non_negative(c.half_height),
            "character capsule dimensions are invalid",
        )?;

        check(self.look_sensitivity.is_finite(), "look_sensitivity must be finite")?;
        check(self.player_spawn.is_finite(), "player_spawn must be finite")?;

        let a = &self.arena;
        check(positive(a.ground_half_extent), "arena.ground_half_extent must be positive")?;
        check(positive(a.cube_half_extent), "arena.cube_half_extent must be positive")?;
        check(
            a.cube_spawn_distance.is_finite() && a.cube_spawn_height.is_finite(),
            "arena cube spawn offsets must be finite",
        )?;
        check(
            a.npc_spawns.iter().all(|s| s.is_finite()),
            "arena.npc_spawns must be finite",
        )?;
        check(non_negative(a.npc_follow_distance), "arena.npc_follow_distance must be non-negative")?;
        Ok(())
    }
}
