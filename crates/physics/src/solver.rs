//! Sequential-impulse contact solver.
//!
//! Bodies are copied into a dense [`SolverBody`] array for the duration of a
//! step; constraints refer to them by slot index.

use glam::{Mat3, Vec3};

use crate::narrowphase::ContactPoint;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverBody {
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub position: Vec3,
    pub inv_mass: f32,
    pub inv_inertia: Mat3,
}

impl SolverBody {
    pub const FIXED: SolverBody = SolverBody {
        linear_velocity: Vec3::ZERO,
        angular_velocity: Vec3::ZERO,
        position: Vec3::ZERO,
        inv_mass: 0.0,
        inv_inertia: Mat3::ZERO,
    };

    #[inline]
    fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }
}

/// Per-pair material mix, computed once when the pair is accepted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PairMaterial {
    pub friction: f32,
    pub restitution: f32,
}

/// Solver tuning, derived from `PhysicsConfig` each step.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverParams {
    pub dt: f32,
    pub baumgarte: f32,
    pub linear_slop: f32,
    pub restitution_threshold: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct ContactConstraint {
    a: usize,
    b: usize,
    normal: Vec3,
    tangents: [Vec3; 2],
    ra: Vec3,
    rb: Vec3,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    friction: f32,
    target_velocity: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

fn effective_mass(a: &SolverBody, b: &SolverBody, ra: Vec3, rb: Vec3, dir: Vec3) -> f32 {
    let ra_x = ra.cross(dir);
    let rb_x = rb.cross(dir);
    let k = a.inv_mass + b.inv_mass + ra_x.dot(a.inv_inertia * ra_x) + rb_x.dot(b.inv_inertia * rb_x);
    if k > 1e-12 { k.recip() } else { 0.0 }
}

impl ContactConstraint {
    pub fn new(
        bodies: &[SolverBody],
        a: usize,
        b: usize,
        contact: &ContactPoint,
        material: PairMaterial,
        params: &SolverParams,
    ) -> Self {
        let body_a = &bodies[a];
        let body_b = &bodies[b];
        let normal = contact.normal;
        let ra = contact.point - body_a.position;
        let rb = contact.point - body_b.position;
        let (t1, t2) = normal.any_orthonormal_pair();

        let inv_dt = params.dt.recip();
        let mut target_velocity = if contact.separation > 0.0 {
            // Speculative: allow closing exactly the remaining gap this step.
            -contact.separation * inv_dt
        } else {
            params.baumgarte * (-contact.separation - params.linear_slop).max(0.0) * inv_dt
        };

        let approach = (body_b.velocity_at(rb) - body_a.velocity_at(ra)).dot(normal);
        let hits_this_step = contact.separation + approach * params.dt < 0.0;
        if material.restitution > 0.0 && approach < -params.restitution_threshold && hits_this_step {
            target_velocity = target_velocity.max(-material.restitution * approach);
        }

        Self {
            a,
            b,
            normal,
            tangents: [t1, t2],
            ra,
            rb,
            normal_mass: effective_mass(body_a, body_b, ra, rb, normal),
            tangent_mass: [
                effective_mass(body_a, body_b, ra, rb, t1),
                effective_mass(body_a, body_b, ra, rb, t2),
            ],
            friction: material.friction,
            target_velocity,
            normal_impulse: 0.0,
            tangent_impulse: [0.0; 2],
        }
    }

    pub fn normal_impulse(&self) -> f32 {
        self.normal_impulse
    }

    pub fn solve(&mut self, bodies: &mut [SolverBody]) {
        let mut a = bodies[self.a];
        let mut b = bodies[self.b];

        // Friction first, bounded by the normal impulse from the last pass.
        let limit = self.friction * self.normal_impulse;
        for i in 0..2 {
            let dir = self.tangents[i];
            let vt = (b.velocity_at(self.rb) - a.velocity_at(self.ra)).dot(dir);
            let lambda = -vt * self.tangent_mass[i];
            let old = self.tangent_impulse[i];
            self.tangent_impulse[i] = (old + lambda).clamp(-limit, limit);
            apply(&mut a, &mut b, self.ra, self.rb, dir * (self.tangent_impulse[i] - old));
        }

        let vn = (b.velocity_at(self.rb) - a.velocity_at(self.ra)).dot(self.normal);
        let lambda = (self.target_velocity - vn) * self.normal_mass;
        let old = self.normal_impulse;
        self.normal_impulse = (old + lambda).max(0.0);
        apply(&mut a, &mut b, self.ra, self.rb, self.normal * (self.normal_impulse - old));

        bodies[self.a] = a;
        bodies[self.b] = b;
    }
}

#[inline]
fn apply(a: &mut SolverBody, b: &mut SolverBody, ra: Vec3, rb: Vec3, impulse: Vec3) {
    a.linear_velocity -= impulse * a.inv_mass;
    a.angular_velocity -= a.inv_inertia * ra.cross(impulse);
    b.linear_velocity += impulse * b.inv_mass;
    b.angular_velocity += b.inv_inertia * rb.cross(impulse);
}
