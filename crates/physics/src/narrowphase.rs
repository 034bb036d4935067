//! Contact generation between posed shapes.
//!
//! Every contact carries its own normal pointing from body A to body B and a
//! signed separation (negative when penetrating). Contacts are produced while
//! the shapes are still up to `margin` apart so the solver can stop an
//! approaching body exactly at the surface instead of correcting overlap
//! after the fact.

use glam::{Quat, Vec3};

use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContactPoint {
    pub point: Vec3,
    pub normal: Vec3,
    pub separation: f32,
}

/// A shape placed in the world.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Posed {
    pub shape: Shape,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Append contacts between `a` and `b` to `out`.
pub(crate) fn collide(a: &Posed, b: &Posed, margin: f32, out: &mut Vec<ContactPoint>) {
    let start = out.len();
    match (a.shape, b.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(a.position, ra, b.position, rb, margin, out);
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            sphere_box(a.position, radius, b.position, b.rotation, half_extents, margin, out);
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            sphere_box(b.position, radius, a.position, a.rotation, half_extents, margin, out);
            flip(&mut out[start..]);
        }
        (Shape::Sphere { radius: ra }, Shape::Capsule { radius: rb, .. }) => {
            let (p, q) = segment(b);
            let c = closest_point_on_segment(a.position, p, q);
            sphere_sphere(a.position, ra, c, rb, margin, out);
        }
        (Shape::Capsule { radius: ra, .. }, Shape::Sphere { radius: rb }) => {
            let (p, q) = segment(a);
            let c = closest_point_on_segment(b.position, p, q);
            sphere_sphere(c, ra, b.position, rb, margin, out);
        }
        (Shape::Capsule { radius: ra, .. }, Shape::Capsule { radius: rb, .. }) => {
            let (p1, q1) = segment(a);
            let (p2, q2) = segment(b);
            let (c1, c2) = closest_points_between_segments(p1, q1, p2, q2);
            sphere_sphere(c1, ra, c2, rb, margin, out);
        }
        (Shape::Capsule { radius, .. }, Shape::Box { half_extents }) => {
            capsule_box(a, radius, b.position, b.rotation, half_extents, margin, out);
        }
        (Shape::Box { half_extents }, Shape::Capsule { radius, .. }) => {
            capsule_box(b, radius, a.position, a.rotation, half_extents, margin, out);
            flip(&mut out[start..]);
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            box_box(a, ha, b, hb, margin, out);
        }
    }
}

fn flip(contacts: &mut [ContactPoint]) {
    for c in contacts {
        c.normal = -c.normal;
    }
}

fn sphere_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32, margin: f32, out: &mut Vec<ContactPoint>) {
    let d = cb - ca;
    let dist = d.length();
    let normal = if dist > 1e-6 { d / dist } else { Vec3::Y };
    let separation = dist - ra - rb;
    if separation > margin {
        return;
    }
    out.push(ContactPoint {
        point: ca + normal * (ra + 0.5 * separation),
        normal,
        separation,
    });
}

/// Closest point on an oriented box to `p`.
///
/// Returns the surface point, the outward normal from the box toward `p`,
/// and the signed distance (negative when `p` is inside).
pub(crate) fn point_box(p: Vec3, center: Vec3, rotation: Quat, half: Vec3) -> (Vec3, Vec3, f32) {
    let local = rotation.conjugate() * (p - center);
    let clamped = local.clamp(-half, half);
    let d = local - clamped;
    let dist_sq = d.length_squared();
    if dist_sq > 1e-12 {
        let dist = dist_sq.sqrt();
        return (center + rotation * clamped, rotation * (d / dist), dist);
    }

    // Inside: push out through the nearest face.
    let gaps = half - local.abs();
    let mut axis = 0;
    if gaps.y < gaps[axis] {
        axis = 1;
    }
    if gaps.z < gaps[axis] {
        axis = 2;
    }
    let sign = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut normal = Vec3::ZERO;
    normal[axis] = sign;
    let mut surface = local;
    surface[axis] = sign * half[axis];
    (center + rotation * surface, rotation * normal, -gaps[axis])
}

fn sphere_box(
    sphere: Vec3,
    radius: f32,
    center: Vec3,
    rotation: Quat,
    half: Vec3,
    margin: f32,
    out: &mut Vec<ContactPoint>,
) {
    let (closest, outward, dist) = point_box(sphere, center, rotation, half);
    let separation = dist - radius;
    if separation > margin {
        return;
    }
    let on_sphere = sphere - outward * radius;
    out.push(ContactPoint {
        point: (on_sphere + closest) * 0.5,
        normal: -outward,
        separation,
    });
}

fn capsule_box(
    capsule: &Posed,
    radius: f32,
    center: Vec3,
    rotation: Quat,
    half: Vec3,
    margin: f32,
    out: &mut Vec<ContactPoint>,
) {
    let (p, q) = segment(capsule);
    sphere_box(p, radius, center, rotation, half, margin, out);
    if p.distance_squared(q) < 1e-8 {
        return;
    }
    sphere_box(q, radius, center, rotation, half, margin, out);

    // Interior point for a capsule lying across an edge: two rounds of
    // alternating projection between segment and box.
    let mut s = closest_point_on_segment(center, p, q);
    for _ in 0..2 {
        let (on_box, _, _) = point_box(s, center, rotation, half);
        s = closest_point_on_segment(on_box, p, q);
    }
    if s.distance_squared(p) > 1e-6 && s.distance_squared(q) > 1e-6 {
        sphere_box(s, radius, center, rotation, half, margin, out);
    }
}

// An edge axis must beat every face axis by this much to be used, so
// resting face contacts stay on the corner path.
const EDGE_AXIS_BIAS: f32 = 1e-3;

fn box_box(a: &Posed, ha: Vec3, b: &Posed, hb: Vec3, margin: f32, out: &mut Vec<ContactPoint>) {
    let axes_a = box_axes(a.rotation);
    let axes_b = box_axes(b.rotation);
    let d = b.position - a.position;
    let separation_along = |n: Vec3| {
        d.dot(n).abs() - projected_radius(&axes_a, ha, n) - projected_radius(&axes_b, hb, n)
    };

    let mut best_face = f32::NEG_INFINITY;
    for n in axes_a.iter().chain(&axes_b) {
        let s = separation_along(*n);
        if s > margin {
            return;
        }
        best_face = best_face.max(s);
    }

    let mut best_edge: Option<(f32, usize, usize, Vec3)> = None;
    for (i, ea) in axes_a.iter().enumerate() {
        for (j, eb) in axes_b.iter().enumerate() {
            let cross = ea.cross(*eb);
            let len = cross.length();
            if len < 1e-4 {
                continue;
            }
            let n = cross / len;
            let s = separation_along(n);
            if s > margin {
                return;
            }
            if best_edge.is_none_or(|(best, ..)| s > best) {
                best_edge = Some((s, i, j, n));
            }
        }
    }

    for v in corners(a.position, a.rotation, ha) {
        let (closest, outward, dist) = point_box(v, b.position, b.rotation, hb);
        if dist <= margin {
            out.push(ContactPoint {
                point: (v + closest) * 0.5,
                normal: -outward,
                separation: dist,
            });
        }
    }
    for v in corners(b.position, b.rotation, hb) {
        let (closest, outward, dist) = point_box(v, a.position, a.rotation, ha);
        if dist <= margin {
            out.push(ContactPoint {
                point: (v + closest) * 0.5,
                normal: outward,
                separation: dist,
            });
        }
    }

    // Crossed edges have no corner inside the other box; contact the two
    // support edges at their closest points.
    if let Some((separation, i, j, n)) = best_edge {
        if separation > best_face + EDGE_AXIS_BIAS {
            let n = if n.dot(d) < 0.0 { -n } else { n };
            let (p1, q1) = support_edge(a.position, &axes_a, ha, i, n);
            let (p2, q2) = support_edge(b.position, &axes_b, hb, j, -n);
            let (ca, cb) = closest_points_between_segments(p1, q1, p2, q2);
            out.push(ContactPoint {
                point: (ca + cb) * 0.5,
                normal: n,
                separation,
            });
        }
    }
}

fn box_axes(rotation: Quat) -> [Vec3; 3] {
    [rotation * Vec3::X, rotation * Vec3::Y, rotation * Vec3::Z]
}

/// Half length of a box's shadow on the unit axis `n`.
fn projected_radius(axes: &[Vec3; 3], half: Vec3, n: Vec3) -> f32 {
    half.x * axes[0].dot(n).abs() + half.y * axes[1].dot(n).abs() + half.z * axes[2].dot(n).abs()
}

/// The edge parallel to `axes[edge]` that lies farthest along `toward`.
fn support_edge(center: Vec3, axes: &[Vec3; 3], half: Vec3, edge: usize, toward: Vec3) -> (Vec3, Vec3) {
    let mut mid = center;
    for k in 0..3 {
        if k != edge {
            let sign = if axes[k].dot(toward) >= 0.0 { 1.0 } else { -1.0 };
            mid += axes[k] * (half[k] * sign);
        }
    }
    let along = axes[edge] * half[edge];
    (mid - along, mid + along)
}

fn corners(center: Vec3, rotation: Quat, half: Vec3) -> [Vec3; 8] {
    let mut out = [Vec3::ZERO; 8];
    for (i, corner) in out.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *corner = center + rotation * (half * sign);
    }
    out
}

/// Endpoints of a capsule's core segment in world space.
pub(crate) fn segment(capsule: &Posed) -> (Vec3, Vec3) {
    let half_height = match capsule.shape {
        Shape::Capsule { half_height, .. } => half_height,
        _ => 0.0,
    };
    let axis = capsule.rotation * Vec3::Y * half_height;
    (capsule.position - axis, capsule.position + axis)
}

pub(crate) fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

fn closest_points_between_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a < 1e-12 && e < 1e-12 {
        return (p1, p2);
    }
    let (s, t) = if a < 1e-12 {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e < 1e-12 {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 1e-12 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posed(shape: Shape, position: Vec3) -> Posed {
        Posed {
            shape,
            position,
            rotation: Quat::IDENTITY,
        }
    }

    fn ground() -> Posed {
        posed(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)), Vec3::new(0.0, -0.5, 0.0))
    }

    #[test]
    fn spheres_touching() {
        let mut out = Vec::new();
        let a = posed(Shape::sphere(1.0), Vec3::ZERO);
        let b = posed(Shape::sphere(1.0), Vec3::new(1.5, 0.0, 0.0));
        collide(&a, &b, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert!((out[0].separation + 0.5).abs() < 1e-6);
        assert!(out[0].normal.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn spheres_beyond_margin_are_skipped() {
        let mut out = Vec::new();
        let a = posed(Shape::sphere(1.0), Vec3::ZERO);
        let b = posed(Shape::sphere(1.0), Vec3::new(3.0, 0.0, 0.0));
        collide(&a, &b, 0.5, &mut out);
        assert!(out.is_empty());
        collide(&a, &b, 1.5, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn sphere_above_ground_normal_points_down() {
        let mut out = Vec::new();
        collide(&posed(Shape::sphere(0.5), Vec3::new(0.0, 0.6, 0.0)), &ground(), 0.5, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].normal.abs_diff_eq(-Vec3::Y, 1e-6));
        assert!((out[0].separation - 0.1).abs() < 1e-5);
    }

    #[test]
    fn box_sphere_order_flips_normal() {
        let mut out = Vec::new();
        collide(&ground(), &posed(Shape::sphere(0.5), Vec3::new(0.0, 0.4, 0.0)), 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].normal.abs_diff_eq(Vec3::Y, 1e-6));
        assert!(out[0].separation < 0.0);
    }

    #[test]
    fn point_inside_box_uses_nearest_face() {
        let (surface, normal, dist) = point_box(
            Vec3::new(0.0, 0.9, 0.0),
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::ONE,
        );
        assert!(normal.abs_diff_eq(Vec3::Y, 1e-6));
        assert!((dist + 0.1).abs() < 1e-6);
        assert!((surface.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cube_resting_on_ground_has_four_contacts() {
        let mut out = Vec::new();
        let cube = posed(Shape::cuboid(Vec3::splat(0.5)), Vec3::new(0.0, 0.5, 0.0));
        collide(&cube, &ground(), 0.01, &mut out);
        assert_eq!(out.len(), 4);
        for c in &out {
            assert!(c.normal.abs_diff_eq(-Vec3::Y, 1e-6));
            assert!(c.separation.abs() < 1e-5);
        }
    }

    fn ridge(axis: Vec3, y: f32) -> Posed {
        Posed {
            shape: Shape::cuboid(Vec3::splat(0.5)),
            position: Vec3::new(0.0, y, 0.0),
            rotation: Quat::from_axis_angle(axis, std::f32::consts::FRAC_PI_4),
        }
    }

    #[test]
    fn crossed_ridges_produce_edge_contact() {
        let touching = std::f32::consts::SQRT_2;
        let lower = ridge(Vec3::X, 0.0);
        let upper = ridge(Vec3::Z, touching - 0.05);
        let mut out = Vec::new();
        collide(&lower, &upper, 0.0, &mut out);
        assert_eq!(out.len(), 1, "{out:?}");
        assert!(out[0].normal.abs_diff_eq(Vec3::Y, 1e-4));
        assert!((out[0].separation + 0.05).abs() < 1e-4);
        assert!(out[0].point.abs_diff_eq(Vec3::new(0.0, touching / 2.0 - 0.025, 0.0), 1e-4));

        // Same pair in the other order: normal still points from A to B.
        out.clear();
        collide(&upper, &lower, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].normal.abs_diff_eq(-Vec3::Y, 1e-4));
    }

    #[test]
    fn crossed_ridges_within_margin_are_speculative() {
        let lower = ridge(Vec3::X, 0.0);
        let upper = ridge(Vec3::Z, std::f32::consts::SQRT_2 + 0.1);
        let mut out = Vec::new();
        collide(&lower, &upper, 0.05, &mut out);
        assert!(out.is_empty());
        collide(&lower, &upper, 0.2, &mut out);
        assert_eq!(out.len(), 1);
        assert!((out[0].separation - 0.1).abs() < 1e-4);
    }

    #[test]
    fn standing_capsule_touches_with_bottom_cap() {
        let mut out = Vec::new();
        let capsule = posed(Shape::capsule(0.4, 0.5), Vec3::new(0.0, 0.9, 0.0));
        collide(&capsule, &ground(), 0.01, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|c| c.normal.abs_diff_eq(-Vec3::Y, 1e-5)));
        assert!(out.iter().all(|c| c.separation.abs() < 1e-5));
    }

    #[test]
    fn parallel_capsules() {
        let mut out = Vec::new();
        let a = posed(Shape::capsule(0.5, 1.0), Vec3::ZERO);
        let b = posed(Shape::capsule(0.5, 1.0), Vec3::new(0.8, 0.0, 0.0));
        collide(&a, &b, 0.0, &mut out);
        assert_eq!(out.len(), 1);
        assert!((out[0].separation + 0.2).abs() < 1e-5);
        assert!(out[0].normal.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn segment_closest_point_clamps() {
        let c = closest_point_on_segment(Vec3::new(5.0, 1.0, 0.0), Vec3::ZERO, Vec3::X);
        assert_eq!(c, Vec3::X);
    }
}
