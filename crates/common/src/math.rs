//! Interpolation and orientation helpers.
//!
//! Every function here is total over finite inputs: degenerate cases
//! (zero-length vectors, near-parallel or zero quaternions) fall back to a
//! stable approximation instead of dividing by something close to zero.

use glam::{Quat, Vec3};

/// Above this dot product two rotations are treated as identical and blended
/// linearly, since `sin(theta)` in the spherical formula approaches zero.
pub const SLERP_NLERP_THRESHOLD: f32 = 0.9995;

const MIN_QUAT_LENGTH_SQ: f32 = 1e-12;

#[inline]
pub fn lerp_vec3(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    from + (to - from) * t
}

/// Normalize, or return identity for a (near) zero quaternion.
#[inline]
pub fn normalize_quat(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if len_sq < MIN_QUAT_LENGTH_SQ || !len_sq.is_finite() {
        Quat::IDENTITY
    } else {
        q * len_sq.sqrt().recip()
    }
}

/// Normalized linear blend with shortest-path correction.
pub fn nlerp(from: Quat, to: Quat, t: f32) -> Quat {
    let dot = from.dot(to);
    let to = if dot < 0.0 || (dot == 0.0 && !has_canonical_sign(to)) { -to } else { to };
    normalize_quat(from * (1.0 - t) + to * t)
}

/// Spherical blend along the shorter arc.
///
/// `slerp(a, b, t)` and `slerp(a, -b, t)` return the same rotation because
/// the sign of `b` is flipped whenever the dot product is negative. At a dot
/// product of exactly zero both arcs are equally long and `b` is given a
/// fixed sign instead.
pub fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    let from = normalize_quat(from);
    let mut to = normalize_quat(to);
    let mut dot = from.dot(to);
    if dot < 0.0 || (dot == 0.0 && !has_canonical_sign(to)) {
        to = -to;
        dot = dot.abs();
    }

    if dot > SLERP_NLERP_THRESHOLD {
        return normalize_quat(from * (1.0 - t) + to * t);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let sin_theta_0 = theta_0.sin();
    let theta = theta_0 * t;
    let s_from = (theta_0 - theta).sin() / sin_theta_0;
    let s_to = theta.sin() / sin_theta_0;
    normalize_quat(from * s_from + to * s_to)
}

/// True when the first non-zero component in (w, x, y, z) order is positive.
/// Picks one of `q` and `-q` when neither is shorter than the other.
fn has_canonical_sign(q: Quat) -> bool {
    [q.w, q.x, q.y, q.z]
        .into_iter()
        .find(|c| *c != 0.0)
        .is_none_or(|c| c > 0.0)
}

/// Yaw angle (radians about +Y) that faces along `direction` in the XZ plane.
/// `+Z` is yaw zero, `+X` is a quarter turn.
#[inline]
pub fn yaw_from_direction(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}
