use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tickwell_common::{Pose, normalize_quat};

use crate::body::{Body, BodyDesc, BodyHandle, MotionType};
use crate::error::PhysicsError;
use crate::layers::{BroadPhaseLayer, LayerTable, ObjectLayer};
use crate::narrowphase::{self, ContactPoint, Posed};
use crate::shape::{Aabb, Shape};
use crate::solver::{ContactConstraint, PairMaterial, SolverBody, SolverParams};

/// World-level tuning. Gravity and capacities are the knobs most callers touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    pub solver_iterations: u32,
    /// Creating a body beyond this fails with `CapacityExceeded`.
    pub max_bodies: usize,
    /// Touching pairs beyond this in one step are dropped.
    pub max_contact_pairs: usize,
    /// Fraction of penetration removed per step.
    pub baumgarte: f32,
    /// Penetration tolerated without correction.
    pub linear_slop: f32,
    /// Extra distance at which contacts are created ahead of touching.
    pub speculative_distance: f32,
    /// Approach speed below which restitution is ignored.
    pub restitution_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            solver_iterations: 8,
            max_bodies: 4096,
            max_contact_pairs: 8192,
            baumgarte: 0.2,
            linear_slop: 0.005,
            speculative_distance: 0.02,
            restitution_threshold: 1.0,
        }
    }
}

/// Counters from the most recent step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub tick: u64,
    pub bodies: usize,
    /// Pairs whose swept bounds overlap.
    pub candidate_pairs: usize,
    /// Candidates surviving both layer filters.
    pub accepted_pairs: usize,
    /// Accepted pairs that produced at least one contact.
    pub contact_pairs: usize,
    pub contacts: usize,
    pub dropped_pairs: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    body: Option<Body>,
}

#[derive(Debug, Clone, Copy)]
struct Proxy {
    index: usize,
    aabb: Aabb,
    bucket: BroadPhaseLayer,
    layer: ObjectLayer,
    margin: f32,
    dynamic: bool,
}

/// Scratch buffers reused across steps.
#[derive(Debug, Default)]
struct StepScratch {
    proxies: Vec<Proxy>,
    pairs: Vec<(usize, usize, f32)>,
    contacts: Vec<ContactPoint>,
    constraints: Vec<ContactConstraint>,
    solver_bodies: Vec<SolverBody>,
}

/// Owns every rigid body and the collision layer table that filters them.
///
/// The layer table is moved in at construction and lives exactly as long as
/// the world. Stepping takes `&mut self`, so it cannot be re-entered.
#[derive(Debug)]
pub struct PhysicsWorld {
    config: PhysicsConfig,
    layers: LayerTable,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    tick: u64,
    stats: StepStats,
    scratch: StepScratch,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig, layers: LayerTable) -> Self {
        tracing::debug!(
            max_bodies = config.max_bodies,
            iterations = config.solver_iterations,
            "physics world created"
        );
        Self {
            config,
            layers,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            tick: 0,
            stats: StepStats::default(),
            scratch: StepScratch::default(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    pub fn body_count(&self) -> usize {
        self.live
    }

    /// Number of completed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    pub fn create_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError> {
        desc.shape.validate()?;
        if !desc.pose.position.is_finite() || !desc.pose.rotation.is_finite() {
            return Err(PhysicsError::InvalidBody(format!("non-finite pose {:?}", desc.pose)));
        }
        if desc.motion == MotionType::Dynamic && !(desc.density.is_finite() && desc.density > 0.0) {
            return Err(PhysicsError::InvalidBody(format!(
                "dynamic body needs positive density, got {}",
                desc.density
            )));
        }
        if self.live >= self.config.max_bodies {
            tracing::warn!(max = self.config.max_bodies, "body capacity exhausted");
            return Err(PhysicsError::CapacityExceeded {
                max: self.config.max_bodies,
            });
        }

        let body = Body::from_desc(&desc);
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.body = Some(body);
                BodyHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    body: Some(body),
                });
                BodyHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        tracing::trace!(?handle, layer = ?desc.layer, "body created");
        Ok(handle)
    }

    /// Remove a body. The handle becomes stale.
    ///
    /// # Panics
    /// If the handle is already stale.
    pub fn destroy_body(&mut self, handle: BodyHandle) {
        let slot = &mut self.slots[handle.index as usize];
        if slot.generation != handle.generation || slot.body.is_none() {
            panic!("destroy_body: stale body handle {handle:?}");
        }
        slot.body = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        tracing::trace!(?handle, "body destroyed");
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|s| s.generation == handle.generation && s.body.is_some())
    }

    pub(crate) fn body(&self, handle: BodyHandle) -> &Body {
        match self.slots.get(handle.index as usize) {
            Some(Slot {
                generation,
                body: Some(body),
            }) if *generation == handle.generation => body,
            _ => panic!("stale body handle {handle:?}"),
        }
    }

    fn body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        match self.slots.get_mut(handle.index as usize) {
            Some(Slot {
                generation,
                body: Some(body),
            }) if *generation == handle.generation => body,
            _ => panic!("stale body handle {handle:?}"),
        }
    }

    pub(crate) fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.body.as_ref().map(|body| {
                (
                    BodyHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    body,
                )
            })
        })
    }

    pub fn position(&self, handle: BodyHandle) -> Vec3 {
        self.body(handle).position
    }

    pub fn rotation(&self, handle: BodyHandle) -> Quat {
        self.body(handle).rotation
    }

    pub fn pose(&self, handle: BodyHandle) -> Pose {
        let body = self.body(handle);
        Pose::new(body.position, body.rotation)
    }

    pub fn shape(&self, handle: BodyHandle) -> Shape {
        self.body(handle).shape
    }

    pub fn layer(&self, handle: BodyHandle) -> ObjectLayer {
        self.body(handle).layer
    }

    pub fn motion(&self, handle: BodyHandle) -> MotionType {
        self.body(handle).motion
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Vec3 {
        self.body(handle).linear_velocity
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        self.body_mut(handle).linear_velocity = velocity;
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> Vec3 {
        self.body(handle).angular_velocity
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        self.body_mut(handle).angular_velocity = velocity;
    }

    pub fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) {
        self.body_mut(handle).rotation = normalize_quat(rotation);
    }

    /// Move a body instantly. Velocities are left alone.
    pub fn set_pose(&mut self, handle: BodyHandle, pose: Pose) {
        let body = self.body_mut(handle);
        body.position = pose.position;
        body.rotation = normalize_quat(pose.rotation);
    }

    /// Advance the simulation by exactly `dt` seconds.
    ///
    /// Callers pass the fixed tick duration; passing a variable frame delta
    /// makes results depend on frame rate.
    pub fn step(&mut self, dt: f32) -> StepStats {
        let _span = tracing::trace_span!("physics_step", tick = self.tick).entered();
        let mut stats = StepStats {
            tick: self.tick + 1,
            bodies: self.live,
            ..StepStats::default()
        };
        let config = &self.config;
        let layers = &self.layers;
        let slots = &mut self.slots;
        let scratch = &mut self.scratch;

        // Forces and damping.
        for body in slots.iter_mut().filter_map(|s| s.body.as_mut()) {
            if !body.is_dynamic() {
                continue;
            }
            body.linear_velocity += config.gravity * dt;
            body.linear_velocity *= (1.0 + dt * body.material.linear_damping).recip();
            body.angular_velocity *= (1.0 + dt * body.material.angular_damping).recip();
        }

        // Broad phase: swept bounds, sort and sweep along X.
        scratch.proxies.clear();
        for (index, slot) in slots.iter().enumerate() {
            let Some(body) = &slot.body else { continue };
            let reach = bounding_radius(&body.shape);
            let margin = (body.linear_velocity.length() + body.angular_velocity.length() * reach) * dt
                + config.speculative_distance;
            scratch.proxies.push(Proxy {
                index,
                aabb: body.shape.aabb(body.position, body.rotation).expanded(margin),
                bucket: layers.broad_phase_layer(body.layer),
                layer: body.layer,
                margin,
                dynamic: body.is_dynamic(),
            });
        }
        scratch.proxies.sort_by(|a, b| {
            a.aabb
                .min
                .x
                .total_cmp(&b.aabb.min.x)
                .then(a.index.cmp(&b.index))
        });

        scratch.pairs.clear();
        for (i, a) in scratch.proxies.iter().enumerate() {
            for b in &scratch.proxies[i + 1..] {
                if b.aabb.min.x > a.aabb.max.x {
                    break;
                }
                if !a.aabb.overlaps(&b.aabb) {
                    continue;
                }
                stats.candidate_pairs += 1;
                if !layers.broad_phase_pair(a.bucket, b.bucket) || !layers.object_pair(a.layer, b.layer) {
                    continue;
                }
                if !a.dynamic && !b.dynamic {
                    continue;
                }
                stats.accepted_pairs += 1;
                let (lo, hi) = if a.index < b.index { (a.index, b.index) } else { (b.index, a.index) };
                scratch.pairs.push((lo, hi, a.margin + b.margin));
            }
        }
        scratch.pairs.sort_unstable_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));

        // Narrow phase.
        scratch.solver_bodies.clear();
        scratch.solver_bodies.extend(slots.iter().map(|slot| match &slot.body {
            Some(body) => SolverBody {
                linear_velocity: body.linear_velocity,
                angular_velocity: body.angular_velocity,
                position: body.position,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_inertia_world(),
            },
            None => SolverBody::FIXED,
        }));

        let params = SolverParams {
            dt,
            baumgarte: config.baumgarte,
            linear_slop: config.linear_slop,
            restitution_threshold: config.restitution_threshold,
        };
        scratch.constraints.clear();
        for &(ia, ib, margin) in &scratch.pairs {
            let (Some(a), Some(b)) = (&slots[ia].body, &slots[ib].body) else {
                continue;
            };
            scratch.contacts.clear();
            narrowphase::collide(&posed(a), &posed(b), margin, &mut scratch.contacts);
            if scratch.contacts.is_empty() {
                continue;
            }
            if stats.contact_pairs >= config.max_contact_pairs {
                stats.dropped_pairs += 1;
                continue;
            }
            stats.contact_pairs += 1;
            stats.contacts += scratch.contacts.len();
            let material = PairMaterial {
                friction: (a.material.friction * b.material.friction).max(0.0).sqrt(),
                restitution: a.material.restitution.max(b.material.restitution),
            };
            for contact in &scratch.contacts {
                scratch.constraints.push(ContactConstraint::new(
                    &scratch.solver_bodies,
                    ia,
                    ib,
                    contact,
                    material,
                    &params,
                ));
            }
        }
        if stats.dropped_pairs > 0 {
            tracing::warn!(
                dropped = stats.dropped_pairs,
                max = config.max_contact_pairs,
                "contact pair capacity exceeded; pairs dropped this step"
            );
        }

        for _ in 0..config.solver_iterations {
            for constraint in scratch.constraints.iter_mut() {
                constraint.solve(&mut scratch.solver_bodies);
            }
        }

        // Write back and integrate positions.
        for (slot, solved) in slots.iter_mut().zip(&scratch.solver_bodies) {
            let Some(body) = slot.body.as_mut() else { continue };
            if !body.is_dynamic() {
                continue;
            }
            body.linear_velocity = solved.linear_velocity;
            body.angular_velocity = solved.angular_velocity;
            body.position += body.linear_velocity * dt;
            let w = body.angular_velocity;
            if w.length_squared() > 0.0 {
                let spin = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.rotation;
                body.rotation = normalize_quat(body.rotation + spin * (0.5 * dt));
            }
        }

        self.tick += 1;
        self.stats = stats;
        tracing::trace!(
            candidates = stats.candidate_pairs,
            accepted = stats.accepted_pairs,
            contacts = stats.contacts,
            "physics step complete"
        );
        stats
    }
}

fn posed(body: &Body) -> Posed {
    Posed {
        shape: body.shape,
        position: body.position,
        rotation: body.rotation,
    }
}

fn bounding_radius(shape: &Shape) -> f32 {
    match *shape {
        Shape::Sphere { radius } => radius,
        Shape::Box { half_extents } => half_extents.length(),
        Shape::Capsule {
            radius,
            half_height,
        } => radius + half_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Material;

    const DT: f32 = 1.0 / 60.0;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default(), LayerTable::default())
    }

    fn add_ground(world: &mut PhysicsWorld) -> BodyHandle {
        world
            .create_body(BodyDesc::fixed(
                Shape::cuboid(Vec3::new(50.0, 0.5, 50.0)),
                Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
            ))
            .unwrap()
    }

    #[test]
    fn create_and_destroy() {
        let mut w = world();
        let h = add_ground(&mut w);
        assert_eq!(w.body_count(), 1);
        assert!(w.contains(h));
        w.destroy_body(h);
        assert_eq!(w.body_count(), 0);
        assert!(!w.contains(h));
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut w = world();
        let a = add_ground(&mut w);
        w.destroy_body(a);
        let b = add_ground(&mut w);
        assert_eq!(a.index, b.index);
        assert_ne!(a, b);
        assert!(!w.contains(a));
        assert!(w.contains(b));
    }

    #[test]
    #[should_panic(expected = "stale body handle")]
    fn stale_handle_query_panics() {
        let mut w = world();
        let h = add_ground(&mut w);
        w.destroy_body(h);
        let _ = w.position(h);
    }

    #[test]
    fn capacity_is_enforced() {
        let config = PhysicsConfig {
            max_bodies: 2,
            ..PhysicsConfig::default()
        };
        let mut w = PhysicsWorld::new(config, LayerTable::default());
        add_ground(&mut w);
        add_ground(&mut w);
        let err = w
            .create_body(BodyDesc::dynamic(Shape::sphere(0.5), Pose::default()))
            .unwrap_err();
        assert_eq!(err, PhysicsError::CapacityExceeded { max: 2 });
        assert_eq!(w.body_count(), 2);
    }

    #[test]
    fn invalid_descriptions_are_rejected() {
        let mut w = world();
        assert!(matches!(
            w.create_body(BodyDesc::dynamic(Shape::sphere(-1.0), Pose::default())),
            Err(PhysicsError::InvalidShape(_))
        ));
        assert!(matches!(
            w.create_body(BodyDesc::dynamic(Shape::sphere(1.0), Pose::default()).with_density(0.0)),
            Err(PhysicsError::InvalidBody(_))
        ));
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn free_fall_matches_gravity() {
        let mut w = PhysicsWorld::new(
            PhysicsConfig::default(),
            LayerTable::default(),
        );
        let desc = BodyDesc::dynamic(Shape::sphere(0.5), Pose::from_position(Vec3::new(0.0, 100.0, 0.0)))
            .with_material(Material {
                linear_damping: 0.0,
                ..Material::default()
            });
        let h = w.create_body(desc).unwrap();
        for _ in 0..60 {
            w.step(DT);
        }
        assert!((w.linear_velocity(h).y + 9.81).abs() < 1e-3);
    }

    #[test]
    fn sphere_drop_rests_on_ground() {
        let mut w = world();
        add_ground(&mut w);
        let ball = w
            .create_body(BodyDesc::dynamic(
                Shape::sphere(0.5),
                Pose::from_position(Vec3::new(0.0, 10.0, 0.0)),
            ))
            .unwrap();

        let mut last = w.position(ball).y;
        for tick in 0..120 {
            w.step(DT);
            let y = w.position(ball).y;
            assert!(y <= last + 1e-5, "height rose at tick {tick}: {last} -> {y}");
            last = y;
        }
        assert!((last - 0.5).abs() < 0.01, "resting height {last}");
        assert!(w.linear_velocity(ball).length() < 0.05);
    }

    #[test]
    fn cube_drop_rests_on_ground() {
        let mut w = world();
        add_ground(&mut w);
        let cube = w
            .create_body(BodyDesc::dynamic(
                Shape::cuboid(Vec3::splat(0.5)),
                Pose::from_position(Vec3::new(0.0, 10.0, 0.0)),
            ))
            .unwrap();
        let mut checkpoints = Vec::new();
        for tick in 1..=120 {
            w.step(DT);
            if tick % 20 == 0 {
                checkpoints.push(w.position(cube).y);
            }
        }
        for pair in checkpoints.windows(2) {
            assert!(pair[1] <= pair[0] + 5e-3, "cube rose: {checkpoints:?}");
        }
        let y = w.position(cube).y;
        assert!((y - 0.5).abs() < 0.05, "resting height {y}");
    }

    #[test]
    fn cube_landing_ridge_on_ridge_does_not_sink() {
        let mut w = world();
        let diagonal = std::f32::consts::FRAC_PI_4;
        w.create_body(BodyDesc::fixed(
            Shape::cuboid(Vec3::splat(0.5)),
            Pose::new(Vec3::ZERO, Quat::from_rotation_x(diagonal)),
        ))
        .unwrap();
        let touching = std::f32::consts::SQRT_2;
        let upper = w
            .create_body(BodyDesc::dynamic(
                Shape::cuboid(Vec3::splat(0.5)),
                Pose::new(Vec3::new(0.0, touching + 0.3, 0.0), Quat::from_rotation_z(diagonal)),
            ))
            .unwrap();
        for tick in 1..=40 {
            w.step(DT);
            let gap = w.position(upper).y - touching;
            assert!(gap > -0.03, "tick {tick}: upper ridge {gap} into lower ridge");
        }
    }

    #[test]
    fn debris_passes_through_dynamic() {
        let mut w = world();
        let cube = w
            .create_body(BodyDesc::dynamic(Shape::cuboid(Vec3::splat(0.5)), Pose::default()))
            .unwrap();
        let debris = w
            .create_body(
                BodyDesc::dynamic(Shape::sphere(0.25), Pose::from_position(Vec3::new(0.0, 0.5, 0.0)))
                    .with_layer(ObjectLayer::Debris),
            )
            .unwrap();
        let stats = w.step(DT);
        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.accepted_pairs, 0);
        assert!(w.linear_velocity(debris).y < 0.0);
        assert!(w.linear_velocity(cube).y < 0.0);
    }

    #[test]
    fn static_pairs_never_reach_narrow_phase() {
        let mut w = world();
        add_ground(&mut w);
        add_ground(&mut w);
        let stats = w.step(DT);
        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.accepted_pairs, 0);
    }

    #[test]
    fn contact_pair_capacity_drops_extra_pairs() {
        let config = PhysicsConfig {
            max_contact_pairs: 1,
            ..PhysicsConfig::default()
        };
        let mut w = PhysicsWorld::new(config, LayerTable::default());
        add_ground(&mut w);
        for x in [-2.0, 2.0] {
            w.create_body(BodyDesc::dynamic(
                Shape::sphere(0.5),
                Pose::from_position(Vec3::new(x, 0.5, 0.0)),
            ))
            .unwrap();
        }
        let stats = w.step(DT);
        assert_eq!(stats.contact_pairs, 1);
        assert_eq!(stats.dropped_pairs, 1);
    }

    #[test]
    fn identical_worlds_step_identically() {
        let build = || {
            let mut w = world();
            add_ground(&mut w);
            let mut hs = Vec::new();
            for i in 0..5 {
                let pose = Pose::new(
                    Vec3::new(i as f32 * 0.3, 2.0 + i as f32 * 1.1, 0.0),
                    Quat::from_rotation_z(0.2 * i as f32),
                );
                hs.push(w.create_body(BodyDesc::dynamic(Shape::cuboid(Vec3::splat(0.4)), pose)).unwrap());
            }
            (w, hs)
        };
        let (mut a, ha) = build();
        let (mut b, hb) = build();
        for _ in 0..90 {
            a.step(DT);
            b.step(DT);
        }
        for (x, y) in ha.iter().zip(&hb) {
            assert_eq!(a.pose(*x), b.pose(*y));
        }
    }

    #[test]
    fn locked_rotation_body_stays_upright() {
        let mut w = world();
        add_ground(&mut w);
        let h = w
            .create_body(
                BodyDesc::dynamic(Shape::capsule(0.4, 0.5), Pose::from_position(Vec3::new(0.0, 0.95, 0.0)))
                    .with_layer(ObjectLayer::Character)
                    .with_locked_rotation(),
            )
            .unwrap();
        w.set_linear_velocity(h, Vec3::new(3.0, 0.0, 0.0));
        for _ in 0..30 {
            w.step(DT);
        }
        assert!(w.rotation(h).abs_diff_eq(Quat::IDENTITY, 1e-6));
        assert!((w.position(h).y - 0.9).abs() < 0.02);
    }
}
