//! Collision detection and response for a ball against line segments
//!
//! Wall segments have zero thickness, so a fast ball can cross one inside a
//! single step (the ball moves ~18 units per step at impact speed, more
//! than its diameter). Static overlap checks handle walls that appear on
//! top of the ball; a swept test finds the time of impact for everything
//! else.

use glam::Vec2;

use crate::perp;

/// Squared length below which a segment is treated as a point
const DEGENERATE_LEN_SQ: f32 = 1e-8;
/// Distance within which a ball already touches a surface
const CONTACT_TOLERANCE: f32 = 1e-3;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Closest point on the segment (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward ball center)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Earliest contact along a swept path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfImpact {
    /// Fraction of the path travelled before contact, in [0, 1]
    pub t: f32,
    /// Contact point on the segment
    pub point: Vec2,
    /// Surface normal (pointing toward ball center at contact)
    pub normal: Vec2,
}

/// Closest point on segment `a`-`b` to `p`
#[inline]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let line_vec = b - a;
    let line_len_sq = line_vec.length_squared();
    if line_len_sq < DEGENERATE_LEN_SQ {
        return a;
    }
    let t = ((p - a).dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    a + line_vec * t
}

/// Check a ball for overlap with a segment
///
/// Segments are two-sided: the normal points from the segment toward the
/// ball on whichever side the ball is.
pub fn circle_segment_collision(center: Vec2, radius: f32, a: Vec2, b: Vec2) -> CollisionResult {
    let closest = closest_point_on_segment(center, a, b);
    let delta = center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= radius * radius {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 {
        delta / dist
    } else {
        // Center sits on the segment: either face will do
        let line_vec = b - a;
        if line_vec.length_squared() < DEGENERATE_LEN_SQ {
            Vec2::Y
        } else {
            perp(line_vec).normalize()
        }
    };

    CollisionResult {
        hit: true,
        point: closest,
        normal,
        penetration: radius - dist,
    }
}

/// Sweep a ball from `start` by `motion` against segment `a`-`b`
///
/// Returns the earliest time of impact where the ball surface touches the
/// segment while moving toward it. A ball that already touches or overlaps
/// the segment and keeps approaching it is in contact at `t = 0`.
pub fn sweep_circle_segment(
    start: Vec2,
    motion: Vec2,
    radius: f32,
    a: Vec2,
    b: Vec2,
) -> Option<TimeOfImpact> {
    let mut best: Option<TimeOfImpact> = None;
    let mut consider = |toi: TimeOfImpact| {
        if best.is_none_or(|current| toi.t < current.t) {
            best = Some(toi);
        }
    };

    // Faces: the two lines parallel to the segment at distance `radius`
    let line_vec = b - a;
    let line_len_sq = line_vec.length_squared();
    if line_len_sq >= DEGENERATE_LEN_SQ {
        let n = perp(line_vec).normalize();
        let s0 = (start - a).dot(n);
        let sd = motion.dot(n);
        if sd.abs() > 1e-9 && s0 * sd < 0.0 {
            let side = s0.signum();
            let t = if s0.abs() <= radius + CONTACT_TOLERANCE {
                0.0
            } else {
                (side * radius - s0) / sd
            };
            if (0.0..=1.0).contains(&t) {
                let center = start + motion * t;
                let u = (center - a).dot(line_vec) / line_len_sq;
                if (0.0..=1.0).contains(&u) {
                    consider(TimeOfImpact {
                        t,
                        point: a + line_vec * u,
                        normal: n * side,
                    });
                }
            }
        }
    }

    // Caps: circles of `radius` around each endpoint
    let motion_len_sq = motion.length_squared();
    if motion_len_sq > 1e-12 {
        for endpoint in [a, b] {
            if let Some(t) = sweep_point(start, motion, motion_len_sq, radius, endpoint) {
                let center = start + motion * t;
                consider(TimeOfImpact {
                    t,
                    point: endpoint,
                    normal: (center - endpoint).normalize_or(Vec2::Y),
                });
            }
        }
    }

    best
}

/// Earliest t in [0, 1] where `start + motion * t` is `radius` from `point`
fn sweep_point(
    start: Vec2,
    motion: Vec2,
    motion_len_sq: f32,
    radius: f32,
    point: Vec2,
) -> Option<f32> {
    let f = start - point;
    let half_b = f.dot(motion);
    if half_b >= 0.0 {
        return None; // moving away
    }
    let touching = radius + CONTACT_TOLERANCE;
    if f.length_squared() <= touching * touching {
        return Some(0.0);
    }
    let c = f.length_squared() - radius * radius;
    let disc = half_b * half_b - motion_len_sq * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-half_b - disc.sqrt()) / motion_len_sq;
    (0.0..=1.0).contains(&t).then_some(t)
}

/// True if the path `p0`-`p1` properly crosses segment `a`-`b`
pub fn path_crosses_segment(p0: Vec2, p1: Vec2, a: Vec2, b: Vec2) -> bool {
    let line = b - a;
    let path = p1 - p0;
    let d0 = line.perp_dot(p0 - a);
    let d1 = line.perp_dot(p1 - a);
    let da = path.perp_dot(a - p0);
    let db = path.perp_dot(b - p0);
    d0 * d1 < 0.0 && da * db < 0.0
}

/// Velocity after a contact with an immovable surface
///
/// The normal component is reversed and scaled by `restitution`; the
/// tangential component is kept (no friction).
#[inline]
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    velocity - (1.0 + restitution) * vn * normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_point_clamps_to_endpoints() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(closest_point_on_segment(Vec2::new(5.0, 3.0), a, b), Vec2::new(5.0, 0.0));
        assert_eq!(closest_point_on_segment(Vec2::new(-4.0, 3.0), a, b), a);
        assert_eq!(closest_point_on_segment(Vec2::new(14.0, -3.0), a, b), b);
    }

    #[test]
    fn test_closest_point_degenerate_segment() {
        let a = Vec2::new(2.0, 2.0);
        assert_eq!(closest_point_on_segment(Vec2::new(9.0, 9.0), a, a), a);
    }

    #[test]
    fn test_overlap_from_above() {
        let result = circle_segment_collision(
            Vec2::new(5.0, 4.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
        );
        assert!(result.hit);
        assert!((result.normal - Vec2::Y).length() < 1e-6);
        assert!((result.penetration - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlap_from_below_is_two_sided() {
        let result = circle_segment_collision(
            Vec2::new(5.0, -4.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
        );
        assert!(result.hit);
        assert!((result.normal + Vec2::Y).length() < 1e-6);
    }

    #[test]
    fn test_overlap_miss() {
        let result = circle_segment_collision(
            Vec2::new(5.0, 8.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
        );
        assert!(!result.hit);
    }

    #[test]
    fn test_center_on_segment_gets_unit_normal() {
        let result = circle_segment_collision(
            Vec2::new(5.0, 0.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
        );
        assert!(result.hit);
        assert!((result.normal.length() - 1.0).abs() < 1e-6);
        assert!((result.penetration - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_sweep_hits_face() {
        // Falling 30 units onto a floor 10 units below the ball surface
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 17.0),
            Vec2::new(0.0, -30.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        )
        .expect("should hit the floor");
        assert!((toi.t - 10.0 / 30.0).abs() < 1e-5);
        assert!((toi.normal - Vec2::Y).length() < 1e-6);
        assert!((toi.point - Vec2::new(50.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_sweep_catches_tunneling() {
        // Motion passes completely through the zero-thickness segment
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 10.0),
            Vec2::new(0.0, -40.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        );
        assert!(toi.is_some());
    }

    #[test]
    fn test_sweep_hits_endpoint_cap() {
        // Moving left toward the end of a vertical post
        let toi = sweep_circle_segment(
            Vec2::new(20.0, 12.0),
            Vec2::new(-20.0, 0.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 10.0),
        )
        .expect("should clip the top of the post");
        assert!(toi.t > 0.0 && toi.t < 1.0);
        assert_eq!(toi.point, Vec2::new(0.0, 10.0));
        assert!((toi.normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sweep_moving_away() {
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 10.0),
            Vec2::new(0.0, 30.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        );
        assert!(toi.is_none());
    }

    #[test]
    fn test_sweep_parallel_miss() {
        let toi = sweep_circle_segment(
            Vec2::new(-50.0, 10.0),
            Vec2::new(200.0, 0.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        );
        assert!(toi.is_none());
    }

    #[test]
    fn test_sweep_touching_face_contacts_at_start() {
        // Resting exactly on the floor and pushed further into it
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 7.0),
            Vec2::new(3.0, -2.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        )
        .expect("touching and approaching is a contact");
        assert_eq!(toi.t, 0.0);
        assert!((toi.normal - Vec2::Y).length() < 1e-6);
    }

    #[test]
    fn test_sweep_overlapping_face_contacts_at_start() {
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 2.5),
            Vec2::new(0.0, -5.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        )
        .expect("overlapping and approaching is a contact");
        assert_eq!(toi.t, 0.0);
    }

    #[test]
    fn test_sweep_touching_cap_contacts_at_start() {
        let toi = sweep_circle_segment(
            Vec2::new(0.0, 17.0),
            Vec2::new(0.0, -4.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 10.0),
        )
        .expect("touching the end of the post");
        assert_eq!(toi.t, 0.0);
        assert_eq!(toi.point, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_sweep_touching_but_separating_is_not_a_contact() {
        let toi = sweep_circle_segment(
            Vec2::new(50.0, 7.0),
            Vec2::new(1.0, 2.0),
            7.0,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        );
        assert!(toi.is_none());
    }

    #[test]
    fn test_path_crosses_segment() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert!(path_crosses_segment(Vec2::new(5.0, 2.0), Vec2::new(5.0, -2.0), a, b));
        assert!(!path_crosses_segment(Vec2::new(5.0, 2.0), Vec2::new(5.0, 0.5), a, b));
        assert!(!path_crosses_segment(Vec2::new(12.0, 2.0), Vec2::new(12.0, -2.0), a, b));
    }

    #[test]
    fn test_bounce_velocity() {
        let v = bounce_velocity(Vec2::new(3.0, -100.0), Vec2::Y, 0.95);
        assert!((v.x - 3.0).abs() < 1e-5);
        assert!((v.y - 95.0).abs() < 1e-3);

        // Separating velocity is untouched
        let v = bounce_velocity(Vec2::new(0.0, 10.0), Vec2::Y, 0.95);
        assert_eq!(v, Vec2::new(0.0, 10.0));
    }
}
