use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tickwell_common::{EntityId, Pose};
use tickwell_ecs::{
    Archetype, CharacterData, CharacterKind, CubeData, CubeKind, EntityStore, PropData, PropKind,
    RenderInstance,
};
use tickwell_input::{InputDevice, InputLatch, InputState};
use tickwell_physics::{LayerTable, PhysicsError, PhysicsWorld, Shape, StepStats};
use tracing::{debug, info, info_span, trace, warn};

use crate::character::CharacterController;
use crate::clock::{FixedClock, TICK_DURATION_F32};
use crate::config::SimConfig;
use crate::error::SimError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    #[default]
    ThirdPerson,
    FirstPerson,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
        }
    }
}

/// Presentation state driven by mode inputs and mouse look. Movement input
/// is interpreted relative to `yaw`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub mode: CameraMode,
    pub yaw: f32,
}

impl CameraState {
    /// Horizontal unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::Z
    }
}

/// Something noteworthy that happened during a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    CubeSpawned { id: EntityId, tick: u64, position: Vec3 },
    PlayerRespawned { tick: u64, position: Vec3 },
    Jumped { id: EntityId, tick: u64 },
    CameraModeChanged(CameraMode),
    DebugOverlayToggled(bool),
    PauseToggled(bool),
}

/// Summary of one call to [`Simulation::frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    /// Clamped frame duration the clock accepted.
    pub frame_time: f64,
    pub ticks: u32,
    /// Total ticks since start.
    pub tick: u64,
    pub alpha: f32,
    pub paused: bool,
    pub events: Vec<SimEvent>,
}

/// The fixed-tick simulation: clock, input latch, physics and entity stores
/// advanced together, one render frame at a time.
///
/// Everything that feeds the physics step happens inside a tick at
/// [`TICK_DURATION`](crate::TICK_DURATION); the render delta only decides
/// how many ticks run. Given the same per-tick input the state is identical
/// whatever the frame rate.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    clock: FixedClock,
    input: InputLatch,
    physics: PhysicsWorld,
    controller: CharacterController,
    cubes: EntityStore<CubeKind>,
    characters: EntityStore<CharacterKind>,
    props: EntityStore<PropKind>,
    player: EntityId,
    ground: EntityId,
    camera: CameraState,
    debug_overlay: bool,
    paused: bool,
    last_step: StepStats,
    events: Vec<SimEvent>,
}

impl Simulation {
    /// Validate `config` and build the arena: ground slab, player, NPCs.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let _span = info_span!("sim_init").entered();

        let mut physics = PhysicsWorld::new(config.physics.clone(), LayerTable::default());
        let mut props = EntityStore::new();
        let mut characters = EntityStore::new();

        let extent = config.arena.ground_half_extent;
        let ground = props.spawn(
            &mut physics,
            Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
            PropData::fixed(Shape::cuboid(Vec3::new(extent, 0.5, extent))),
        )?;

        let c = &config.character;
        let player = characters.spawn(
            &mut physics,
            Pose::from_position(config.player_spawn),
            CharacterData::new(Archetype::Player, c.radius, c.half_height),
        )?;
        for spawn in &config.arena.npc_spawns {
            characters.spawn(
                &mut physics,
                Pose::from_position(*spawn),
                CharacterData::new(Archetype::Npc, c.radius, c.half_height),
            )?;
        }

        info!(
            bodies = physics.body_count(),
            npcs = config.arena.npc_spawns.len(),
            player = %player.short(),
            "simulation ready"
        );

        Ok(Self {
            clock: FixedClock::new(config.max_frame_delta),
            input: InputLatch::new(config.bindings.clone()),
            controller: CharacterController::new(config.character),
            config,
            physics,
            cubes: EntityStore::new(),
            characters,
            props,
            player,
            ground,
            camera: CameraState::default(),
            debug_overlay: false,
            paused: false,
            last_step: StepStats::default(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    pub fn tick(&self) -> u64 {
        self.clock.tick()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn cubes(&self) -> &EntityStore<CubeKind> {
        &self.cubes
    }

    pub fn characters(&self) -> &EntityStore<CharacterKind> {
        &self.characters
    }

    pub fn props(&self) -> &EntityStore<PropKind> {
        &self.props
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn ground(&self) -> EntityId {
        self.ground
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn input_state(&self) -> &InputState {
        self.input.state()
    }

    /// Counters from the most recent physics step.
    pub fn last_step(&self) -> &StepStats {
        &self.last_step
    }

    pub fn interpolation_alpha(&self) -> f32 {
        self.clock.interpolation_alpha()
    }

    /// Drop a cube with its center at `position`.
    pub fn spawn_cube(&mut self, position: Vec3) -> Result<EntityId, PhysicsError> {
        let half = self.config.arena.cube_half_extent;
        self.cubes.spawn(
            &mut self.physics,
            Pose::from_position(position),
            CubeData {
                half_extents: Vec3::splat(half),
            },
        )
    }

    pub fn despawn_cube(&mut self, id: EntityId) {
        self.cubes.despawn(&mut self.physics, id);
    }

    pub fn spawn_npc(&mut self, position: Vec3) -> Result<EntityId, PhysicsError> {
        let c = &self.config.character;
        let data = CharacterData::new(Archetype::Npc, c.radius, c.half_height);
        self.characters
            .spawn(&mut self.physics, Pose::from_position(position), data)
    }

    pub fn spawn_prop(&mut self, pose: Pose, data: PropData) -> Result<EntityId, PhysicsError> {
        self.props.spawn(&mut self.physics, pose, data)
    }

    /// Run one render frame: sample input, run every due tick, apply mode
    /// toggles. `raw_delta` is wall-clock seconds since the previous frame.
    pub fn frame(&mut self, raw_delta: f64, device: &dyn InputDevice) -> FrameReport {
        let _span = info_span!("frame", frame = self.clock.frames() + 1).entered();

        self.clock
            .begin_frame(if self.paused { 0.0 } else { raw_delta });
        self.input.collect(device);
        self.camera.yaw -= self.input.state().look_delta.x * self.config.look_sensitivity;

        while self.clock.should_step_logic() {
            self.step_tick();
        }

        let modes = self.input.consume_mode_inputs();
        if modes.toggle_camera_mode {
            self.camera.mode = self.camera.mode.toggled();
            self.events.push(SimEvent::CameraModeChanged(self.camera.mode));
        }
        if modes.toggle_debug_overlay {
            self.debug_overlay = !self.debug_overlay;
            self.events.push(SimEvent::DebugOverlayToggled(self.debug_overlay));
        }
        if modes.toggle_pause {
            self.paused = !self.paused;
            self.events.push(SimEvent::PauseToggled(self.paused));
            info!(paused = self.paused, "pause toggled");
        }

        FrameReport {
            frame: self.clock.frames(),
            frame_time: self.clock.frame_time(),
            ticks: self.clock.ticks_this_frame(),
            tick: self.clock.tick(),
            alpha: self.clock.interpolation_alpha(),
            paused: self.paused,
            events: std::mem::take(&mut self.events),
        }
    }

    fn step_tick(&mut self) {
        // 1-based number of the tick being run.
        let tick = self.clock.tick();

        self.cubes.store_previous();
        self.characters.store_previous();
        self.props.store_previous();

        self.run_gameplay(tick);
        self.last_step = self.physics.step(TICK_DURATION_F32);

        self.cubes.sync_from_physics(&self.physics);
        self.characters.sync_from_physics(&self.physics);
        self.props.sync_from_physics(&self.physics);

        self.input.consume_triggers();
        trace!(tick, contacts = self.last_step.contacts, "tick");
    }

    fn run_gameplay(&mut self, tick: u64) {
        let state = *self.input.state();

        if state.respawn {
            self.respawn_player(tick);
        }
        if state.spawn_cube {
            self.spawn_cube_ahead(tick);
        }

        let Some(player_body) = self.characters.body(self.player) else {
            return;
        };
        let player_position = self.physics.position(player_body);
        let forward = self.camera.forward();
        let right = forward.cross(Vec3::Y);
        let desired = forward * state.move_z + right * state.move_x;
        let follow = self.config.arena.npc_follow_distance;

        let player = self.player;
        let physics = &mut self.physics;
        let controller = &self.controller;
        for (id, body, data) in self.characters.rows_mut() {
            let jump = match data.archetype {
                Archetype::Player => {
                    data.desired_direction = desired;
                    data.sprinting = state.sprint;
                    state.jump
                }
                Archetype::Npc => {
                    let mut to_player = player_position - physics.position(body);
                    to_player.y = 0.0;
                    data.desired_direction = if to_player.length() > follow {
                        to_player.normalize_or_zero()
                    } else {
                        Vec3::ZERO
                    };
                    data.sprinting = false;
                    false
                }
            };
            let step = controller.update(physics, body, data, jump, TICK_DURATION_F32);
            if step.jumped {
                debug!(id = %id.short(), tick, "jump");
                if id == player {
                    self.events.push(SimEvent::Jumped { id, tick });
                }
            }
        }
    }

    fn respawn_player(&mut self, tick: u64) {
        let position = self.config.player_spawn;
        if let Some(data) = self.characters.data_mut(self.player) {
            data.facing = Quat::IDENTITY;
            data.grounded = false;
        }
        self.characters
            .teleport(&mut self.physics, self.player, Pose::from_position(position));
        debug!(tick, ?position, "player respawned");
        self.events.push(SimEvent::PlayerRespawned { tick, position });
    }

    fn spawn_cube_ahead(&mut self, tick: u64) {
        let Some(pose) = self.characters.pose(self.player) else {
            return;
        };
        let arena = &self.config.arena;
        let position = pose.position
            + pose.rotation * Vec3::Z * arena.cube_spawn_distance
            + Vec3::Y * arena.cube_spawn_height;
        match self.spawn_cube(position) {
            Ok(id) => self.events.push(SimEvent::CubeSpawned { id, tick, position }),
            Err(err) => warn!(tick, %err, "cube spawn rejected"),
        }
    }

    /// Interpolated poses of everything drawable at the current alpha.
    pub fn render_instances(&self) -> Vec<RenderInstance> {
        let alpha = self.clock.interpolation_alpha();
        let mut out = Vec::with_capacity(self.props.len() + self.cubes.len() + self.characters.len());
        out.extend(self.props.render_instances(alpha));
        out.extend(self.cubes.render_instances(alpha));
        out.extend(self.characters.render_instances(alpha));
        out
    }

    /// Interpolated player pose. Camera follow must use this, never the
    /// raw physics pose.
    pub fn player_pose(&self) -> Pose {
        self.characters
            .interpolated_pose(self.player, self.clock.interpolation_alpha())
            .unwrap_or_default()
    }

    /// FNV-1a over the tick and every raw pose in store order. Equal hashes
    /// mean equal simulation state for determinism checks.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mut mix = |bytes: &[u8]| {
            for &b in bytes {
                h ^= u64::from(b);
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&self.clock.tick().to_le_bytes());
        let poses = self
            .props
            .current_poses()
            .chain(self.cubes.current_poses())
            .chain(self.characters.current_poses());
        for pose in poses {
            let p = pose.position;
            let r = pose.rotation;
            for v in [p.x, p.y, p.z, r.x, r.y, r.z, r.w] {
                mix(&v.to_le_bytes());
            }
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TICK_DURATION;
    use tickwell_input::{Binding, Key, ScriptedDevice};
    use tickwell_physics::ObjectLayer;

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default()).unwrap()
    }

    fn frames(sim: &mut Simulation, device: &mut ScriptedDevice, n: usize, delta: f64) {
        for _ in 0..n {
            sim.frame(delta, device);
            device.end_poll();
        }
    }

    #[test]
    fn builds_default_arena() {
        let s = sim();
        assert_eq!(s.props().len(), 1);
        assert_eq!(s.characters().len(), 1);
        assert_eq!(s.physics().body_count(), 2);
        let ground = s.props().body(s.ground()).unwrap();
        assert_eq!(s.physics().layer(ground), ObjectLayer::Static);
        assert_eq!(s.tick(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SimConfig::default();
        cfg.character.move_speed = 0.0;
        assert!(matches!(Simulation::new(cfg), Err(SimError::Config(_))));
    }

    #[test]
    fn capacity_failure_surfaces_as_physics_error() {
        let mut cfg = SimConfig::default();
        cfg.physics.max_bodies = 1;
        assert!(matches!(Simulation::new(cfg), Err(SimError::Physics(_))));
    }

    #[test]
    fn frame_runs_due_ticks() {
        let mut s = sim();
        let dev = ScriptedDevice::new();
        let report = s.frame(TICK_DURATION * 2.5, &dev);
        assert_eq!(report.ticks, 2);
        assert_eq!(report.tick, 2);
        assert!((report.alpha - 0.5).abs() < 1e-4);
        let report = s.frame(10.0, &dev);
        assert_eq!(report.frame_time, s.config().max_frame_delta);
    }

    #[test]
    fn cube_drop_lands_on_ground() {
        let mut s = sim();
        let id = s.spawn_cube(Vec3::new(5.0, 10.0, 5.0)).unwrap();
        let dev = ScriptedDevice::new();
        for _ in 0..240 {
            s.frame(TICK_DURATION, &dev);
            let y = s.cubes().pose(id).unwrap().position.y;
            assert!(y > 0.5 - 0.02, "cube sank to {y}");
        }
        let y = s.cubes().pose(id).unwrap().position.y;
        assert!((y - 0.5).abs() < 0.05, "cube rests at {y}");
        let body = s.cubes().body(id).unwrap();
        assert!(s.physics().linear_velocity(body).length() < 0.05);
    }

    #[test]
    fn spawn_trigger_fires_once_per_press() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        dev.tap(Binding::Key(Key::E));
        // A frame too short to tick keeps the trigger latched.
        let report = s.frame(TICK_DURATION / 4.0, &dev);
        assert_eq!(report.ticks, 0);
        assert_eq!(s.cubes().len(), 0);
        dev.end_poll();

        // Three ticks in one frame: only the first sees the trigger.
        let report = s.frame(TICK_DURATION * 3.0, &dev);
        assert_eq!(report.ticks, 3);
        assert_eq!(s.cubes().len(), 1);
        assert!(matches!(report.events[0], SimEvent::CubeSpawned { tick: 1, .. }));

        frames(&mut s, &mut dev, 10, TICK_DURATION);
        assert_eq!(s.cubes().len(), 1);
    }

    #[test]
    fn mode_toggles_apply_once_per_frame() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        dev.tap(Binding::Key(Key::C));
        dev.tap(Binding::Key(Key::F1));
        let report = s.frame(TICK_DURATION * 3.0, &dev);
        assert_eq!(s.camera().mode, CameraMode::FirstPerson);
        assert!(s.debug_overlay());
        assert_eq!(report.events.len(), 2);

        dev.end_poll();
        s.frame(TICK_DURATION, &dev);
        assert_eq!(s.camera().mode, CameraMode::FirstPerson);
    }

    #[test]
    fn pause_freezes_ticks_and_keeps_triggers() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        dev.tap(Binding::Key(Key::P));
        s.frame(TICK_DURATION, &dev);
        assert!(s.paused());
        let tick = s.tick();

        dev.end_poll();
        dev.tap(Binding::Key(Key::E));
        let report = s.frame(1.0, &dev);
        assert_eq!(report.ticks, 0);
        assert_eq!(s.tick(), tick);
        assert!(s.input_state().spawn_cube);

        dev.end_poll();
        dev.tap(Binding::Key(Key::P));
        s.frame(TICK_DURATION, &dev);
        assert!(!s.paused());
        dev.end_poll();
        s.frame(TICK_DURATION, &dev);
        assert_eq!(s.cubes().len(), 1);
    }

    #[test]
    fn respawn_teleports_without_interpolation_flight() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        dev.press(Binding::Key(Key::W));
        frames(&mut s, &mut dev, 90, TICK_DURATION);
        dev.release(Binding::Key(Key::W));
        let moved = s.player_pose().position;
        assert!(moved.z > 2.0, "player at {moved:?}");

        dev.tap(Binding::Key(Key::R));
        // Tick at the start of the frame, then stop mid-tick.
        let report = s.frame(TICK_DURATION * 1.5, &dev);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::PlayerRespawned { .. })));
        let spawn = s.config().player_spawn;
        let player = s.player();
        let prev = s.characters().previous_pose(player).unwrap().position;
        // Previous is the post-teleport pose, not the far-away one.
        assert!((prev - spawn).length() < 0.1, "previous {prev:?}");
        assert!((s.player_pose().position - spawn).length() < 0.1);
    }

    #[test]
    fn player_walks_relative_to_camera() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        frames(&mut s, &mut dev, 30, TICK_DURATION);
        dev.press(Binding::Key(Key::D));
        frames(&mut s, &mut dev, 60, TICK_DURATION);
        let p = s.player_pose().position;
        // Strafing right with yaw zero moves toward -X.
        assert!(p.x < -1.0, "player at {p:?}");
        assert!(p.z.abs() < 0.1);
    }

    #[test]
    fn jump_leaves_the_ground() {
        let mut s = sim();
        let mut dev = ScriptedDevice::new();
        frames(&mut s, &mut dev, 60, TICK_DURATION);
        let rest = s.player_pose().position.y;
        dev.tap(Binding::Key(Key::Space));
        let report = s.frame(TICK_DURATION, &dev);
        dev.end_poll();
        assert!(report.events.iter().any(|e| matches!(e, SimEvent::Jumped { .. })));
        frames(&mut s, &mut dev, 10, TICK_DURATION);
        assert!(s.player_pose().position.y > rest + 0.3);
    }

    #[test]
    fn npcs_follow_the_player() {
        let mut cfg = SimConfig::default();
        cfg.arena.npc_spawns.push(Vec3::new(10.0, 1.0, 0.0));
        let mut s = Simulation::new(cfg).unwrap();
        let mut dev = ScriptedDevice::new();
        frames(&mut s, &mut dev, 180, TICK_DURATION);
        let npc = s.characters().ids()[1];
        let x = s.characters().pose(npc).unwrap().position.x;
        assert!(x < 4.0, "npc at x {x}");
        assert!(x > 1.5, "npc overshot to x {x}");
    }

    #[test]
    fn render_instances_cover_every_store() {
        let mut s = sim();
        s.spawn_cube(Vec3::new(0.0, 5.0, 3.0)).unwrap();
        s.spawn_npc(Vec3::new(3.0, 1.0, 0.0)).unwrap();
        let dev = ScriptedDevice::new();
        s.frame(TICK_DURATION * 1.5, &dev);
        let instances = s.render_instances();
        assert_eq!(instances.len(), 4);
        let player = instances.iter().find(|i| i.id == s.player()).unwrap();
        assert_eq!(player.pose, s.player_pose());
    }

    #[test]
    fn same_input_at_different_frame_rates_matches() {
        fn run(delta: f64) -> (u64, Vec3) {
            let mut cfg = SimConfig::default();
            cfg.arena.npc_spawns.push(Vec3::new(-6.0, 1.0, 4.0));
            let mut s = Simulation::new(cfg).unwrap();
            s.spawn_cube(Vec3::new(1.0, 6.0, 3.0)).unwrap();
            s.spawn_cube(Vec3::new(1.2, 8.0, 3.1)).unwrap();
            let mut dev = ScriptedDevice::new();
            dev.press(Binding::Key(Key::W));
            dev.press(Binding::Key(Key::A));
            while s.tick() < 240 {
                s.frame(delta, &dev);
                dev.end_poll();
            }
            assert_eq!(s.tick(), 240);
            let player = s.characters().pose(s.player()).unwrap().position;
            (s.state_hash(), player)
        }

        let (reference, player) = run(TICK_DURATION);
        assert!(player.length() > 5.0, "player barely moved: {player:?}");
        assert_eq!(run(TICK_DURATION / 2.0).0, reference);
        assert_eq!(run(TICK_DURATION * 2.0).0, reference);
        assert_eq!(run(TICK_DURATION * 4.0).0, reference);
    }

    #[test]
    fn state_hash_tracks_state() {
        let mut a = sim();
        let mut b = sim();
        assert_eq!(a.state_hash(), b.state_hash());
        let dev = ScriptedDevice::new();
        a.frame(TICK_DURATION, &dev);
        assert_ne!(a.state_hash(), b.state_hash());
        b.frame(TICK_DURATION, &dev);
        assert_eq!(a.state_hash(), b.state_hash());
    }
}
