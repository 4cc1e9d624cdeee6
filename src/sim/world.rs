//! The physics world: one ball, one static anchor, transient walls
//!
//! Walls arrive in perceptual coordinates once per frame and replace the
//! previous set wholesale. Everything inside the world is physics space.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, BodyHandle, Circle, Segment};
use super::collision::{
    bounce_velocity, circle_segment_collision, path_crosses_segment, sweep_circle_segment,
};
use crate::consts::{CONTACT_SLOP, MAX_CCD_ITERATIONS};
use crate::error::{Result, SimError};
use crate::settings::Settings;
use crate::source::LineSegment;
use crate::transform::CoordinateTransform;

const ANCHOR: BodyHandle = BodyHandle(0);
const BALL: BodyHandle = BodyHandle(1);

/// Read-only view of the ball for presentation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub angle: f32,
}

/// A wall in world space, with the body it hangs off
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub a: Vec2,
    pub b: Vec2,
    pub body: BodyHandle,
}

/// What the ball touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactSurface {
    /// Index into the current wall set
    Wall(usize),
    /// Index into the arena boundary
    Boundary(usize),
}

/// A contact resolved during the last step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub surface: ContactSurface,
    pub point: Vec2,
    pub normal: Vec2,
    /// Normal speed into the surface before the contact
    pub impact_speed: f32,
    /// Normal speed away from the surface after the contact
    pub rebound_speed: f32,
}

/// Rigid-body world
#[derive(Debug, Clone)]
pub struct World {
    gravity: Vec2,
    /// Body table; index 0 is the anchor, index 1 the ball. Never shrinks.
    bodies: Vec<Body>,
    ball: Circle,
    /// Current wall set, attached to the anchor
    walls: Vec<Segment>,
    /// Permanent arena edges, attached to the anchor
    boundary: Vec<Segment>,
    transform: CoordinateTransform,
    wall_restitution: f32,
    resting_speed: f32,
    ball_start: Vec2,
    steps: u64,
    time: f64,
    contacts: Vec<ContactEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl World {
    /// Build a world with the ball at rest at its start position
    pub fn new(settings: &Settings) -> Self {
        let ball_body =
            Body::dynamic_disk(settings.ball.mass, settings.ball.radius, settings.ball.start);
        let ball = Circle {
            body: BALL,
            radius: settings.ball.radius,
            offset: Vec2::ZERO,
            restitution: settings.ball.restitution,
        };

        let boundary = if settings.arena_walls {
            let (w, h) = (settings.display_width, settings.display_height);
            let corners = [Vec2::ZERO, Vec2::new(w, 0.0), Vec2::new(w, h), Vec2::new(0.0, h)];
            (0..4)
                .map(|i| Segment::new(ANCHOR, corners[i], corners[(i + 1) % 4]))
                .collect()
        } else {
            Vec::new()
        };

        log::debug!(
            "World created: ball at {:?}, gravity {:?}, {} boundary walls",
            settings.ball.start,
            settings.gravity,
            boundary.len()
        );

        Self {
            gravity: settings.gravity,
            bodies: vec![Body::anchor(), ball_body],
            ball,
            walls: Vec::new(),
            boundary,
            transform: settings.transform(),
            wall_restitution: settings.wall_restitution,
            resting_speed: settings.resting_speed,
            ball_start: settings.ball.start,
            steps: 0,
            time: 0.0,
            contacts: Vec::new(),
        }
    }

    /// Replace every wall with one segment per detected line
    ///
    /// Lines are in perceptual coordinates. All lines are validated before
    /// anything changes: on error the previous wall set stays installed.
    /// Returns the number of walls now installed.
    pub fn set_walls(&mut self, lines: &[LineSegment]) -> Result<usize> {
        if let Some(index) = lines.iter().position(|l| !l.is_finite()) {
            return Err(SimError::InvalidGeometry {
                index,
                reason: format!("non-finite coordinates {:?}", lines[index]),
            });
        }

        let anchor = &self.bodies[ANCHOR.0];
        let walls: Vec<Segment> = lines
            .iter()
            .map(|l| {
                let a = self.transform.to_physics(l.x1, l.y1);
                let b = self.transform.to_physics(l.x2, l.y2);
                Segment::new(ANCHOR, anchor.world_to_local(a), anchor.world_to_local(b))
            })
            .collect();

        self.walls = walls;
        Ok(self.walls.len())
    }

    /// Remove all walls
    pub fn clear_walls(&mut self) {
        self.walls.clear();
    }

    /// Advance the simulation by one fixed interval
    pub fn step(&mut self, dt: f32) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }

        self.contacts.clear();

        let mut body = self.bodies[BALL.0].clone();
        let center = body.local_to_world(self.ball.offset);
        let center = self.resolve_overlaps(center, &mut body.vel);
        let center = self.sweep(center, &mut body.vel, dt);

        body.pos = center - Vec2::from_angle(body.angle).rotate(self.ball.offset);
        body.angle += body.angular_vel * dt;

        // A diverged step is not committed: body, step count and time stay put
        if !body.is_finite() {
            let step = self.steps + 1;
            log::error!("Ball state diverged at step {}: {:?}", step, body);
            return Err(SimError::SimulationDiverged { step });
        }

        self.steps += 1;
        self.time += dt as f64;
        self.bodies[BALL.0] = body;
        Ok(())
    }

    /// Push the ball out of every surface it already overlaps
    ///
    /// Walls are swapped in every frame, so a new wall may cut straight
    /// through the ball. The deepest overlap is resolved first and the rest
    /// are re-checked after each push. A push never moves the center across
    /// another surface; such an overlap is left to the swept pass, which
    /// stops the ball from moving further in.
    fn resolve_overlaps(&mut self, mut center: Vec2, vel: &mut Vec2) -> Vec2 {
        let radius = self.ball.radius;
        let surfaces = self.surfaces();
        let mut blocked: Vec<ContactSurface> = Vec::new();

        for _ in 0..MAX_CCD_ITERATIONS {
            let deepest = surfaces
                .iter()
                .filter(|(surface, _, _)| !blocked.contains(surface))
                .filter_map(|&(surface, a, b)| {
                    let result = circle_segment_collision(center, radius, a, b);
                    result.hit.then_some((surface, result))
                })
                .max_by(|x, y| x.1.penetration.total_cmp(&y.1.penetration));

            let Some((surface, result)) = deepest else {
                break;
            };

            let mut normal = result.normal;
            if result.penetration >= radius - 1e-4 && normal.dot(*vel) > 0.0 {
                // Center on the line: push back the way the ball came
                normal = -normal;
            }
            let target = result.point + normal * (radius + CONTACT_SLOP);

            let crosses = surfaces.iter().any(|&(other, a, b)| {
                other != surface && path_crosses_segment(center, target, a, b)
            });
            if crosses {
                log::debug!(
                    "Overlap with {:?} left to the sweep at step {}",
                    surface,
                    self.steps
                );
                blocked.push(surface);
                continue;
            }
            center = target;

            if let Some(event) = self.apply_contact(surface, result.point, normal, vel) {
                self.contacts.push(event);
            }
        }

        center
    }

    /// Move the ball through `dt`, stopping at each time of impact
    ///
    /// Gravity is integrated exactly over each sub-interval: the ball moves
    /// along the chord of its parabola (mid-interval velocity) and the
    /// velocity at impact is the one at the contact time. A ball that comes
    /// to rest on a surface is supported by it for the rest of the step;
    /// two supports that disagree (a corner) hold the ball in place.
    fn sweep(&mut self, mut center: Vec2, vel: &mut Vec2, dt: f32) -> Vec2 {
        let radius = self.ball.radius;
        let surfaces = self.surfaces();
        let mut accel = self.gravity;
        let mut remaining = dt;
        let mut supports: Vec<Vec2> = Vec::new();

        for _ in 0..MAX_CCD_ITERATIONS {
            let motion = (*vel + accel * (0.5 * remaining)) * remaining;
            if motion.length_squared() < 1e-12 {
                *vel += accel * remaining;
                return center;
            }

            let hit = surfaces
                .iter()
                .filter_map(|&(surface, a, b)| {
                    sweep_circle_segment(center, motion, radius, a, b).map(|toi| (surface, toi))
                })
                .min_by(|x, y| x.1.t.total_cmp(&y.1.t));

            let Some((surface, toi)) = hit else {
                *vel += accel * remaining;
                return center + motion;
            };

            let elapsed = remaining * toi.t;
            center += motion * toi.t + toi.normal * CONTACT_SLOP;
            *vel += accel * elapsed;
            remaining -= elapsed;

            // No event means only gravity carries the ball into the surface
            let event = self.apply_contact(surface, toi.point, toi.normal, vel);
            if event.is_none_or(|e| e.impact_speed < self.resting_speed) {
                supports.push(toi.normal);
                accel = supported(accel, &supports);
                *vel = supported(*vel, &supports);
            }
            if let Some(event) = event {
                self.contacts.push(event);
            }
        }

        // Out of passes: hold position rather than risk tunneling
        log::debug!("Swept collision passes exhausted at step {}", self.steps);
        center
    }

    /// Apply the restitution response for a contact, if the ball approaches
    fn apply_contact(
        &self,
        surface: ContactSurface,
        point: Vec2,
        normal: Vec2,
        vel: &mut Vec2,
    ) -> Option<ContactEvent> {
        let impact = -vel.dot(normal);
        if impact <= 0.0 {
            return None;
        }
        let restitution = if impact < self.resting_speed {
            0.0
        } else {
            (self.ball.restitution * self.wall_restitution).clamp(0.0, 1.0)
        };
        *vel = bounce_velocity(*vel, normal, restitution);
        Some(ContactEvent {
            surface,
            point,
            normal,
            impact_speed: impact,
            rebound_speed: vel.dot(normal),
        })
    }

    /// Every collidable segment in world space, walls first
    fn surfaces(&self) -> Vec<(ContactSurface, Vec2, Vec2)> {
        let walls = self.walls.iter().enumerate().map(|(i, seg)| {
            let (a, b) = seg.world_endpoints(&self.bodies[seg.body.0]);
            (ContactSurface::Wall(i), a, b)
        });
        let boundary = self.boundary.iter().enumerate().map(|(i, seg)| {
            let (a, b) = seg.world_endpoints(&self.bodies[seg.body.0]);
            (ContactSurface::Boundary(i), a, b)
        });
        walls.chain(boundary).collect()
    }

    /// Snapshot of the ball
    pub fn ball_state(&self) -> BallState {
        let body = &self.bodies[BALL.0];
        BallState {
            position: body.local_to_world(self.ball.offset),
            velocity: body.vel,
            radius: self.ball.radius,
            angle: body.angle,
        }
    }

    /// Snapshot of the current walls in world space
    pub fn wall_segments(&self) -> Vec<WallSegment> {
        self.walls
            .iter()
            .map(|seg| {
                let (a, b) = seg.world_endpoints(&self.bodies[seg.body.0]);
                WallSegment {
                    a,
                    b,
                    body: seg.body,
                }
            })
            .collect()
    }

    /// Put the ball back at its start position, at rest
    pub fn reset_ball(&mut self) {
        let body = &mut self.bodies[BALL.0];
        body.pos = self.ball_start;
        body.vel = Vec2::ZERO;
        body.angle = 0.0;
        body.angular_vel = 0.0;
        log::info!("Ball reset to {:?}", self.ball_start);
    }

    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    /// Permanent arena edges in world space
    pub fn boundary_segments(&self) -> Vec<WallSegment> {
        self.boundary
            .iter()
            .map(|seg| {
                let (a, b) = seg.world_endpoints(&self.bodies[seg.body.0]);
                WallSegment {
                    a,
                    b,
                    body: seg.body,
                }
            })
            .collect()
    }

    /// Contacts resolved during the most recent step
    pub fn last_contacts(&self) -> &[ContactEvent] {
        &self.contacts
    }

    /// Number of completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn transform(&self) -> CoordinateTransform {
        self.transform
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0)
    }

    pub fn anchor(&self) -> BodyHandle {
        ANCHOR
    }

    pub fn ball_handle(&self) -> BodyHandle {
        BALL
    }

    /// Kinetic energy of the ball
    pub fn kinetic_energy(&self) -> f32 {
        self.bodies[BALL.0].kinetic_energy()
    }

    /// Overwrite the ball's velocity
    pub fn set_ball_velocity(&mut self, vel: Vec2) {
        self.bodies[BALL.0].vel = vel;
    }

    /// Overwrite the ball's position (physics space)
    pub fn set_ball_position(&mut self, pos: Vec2) {
        self.bodies[BALL.0].pos = pos;
    }
}

/// Remove the part of `v` that pushes into any resting support
///
/// In 2D two non-parallel supports pin the ball completely.
fn supported(v: Vec2, supports: &[Vec2]) -> Vec2 {
    let Some(&latest) = supports.last() else {
        return v;
    };
    let into = v.dot(latest);
    let v = if into < 0.0 { v - into * latest } else { v };
    if supports.iter().any(|n| v.dot(*n) < -1e-4) {
        Vec2::ZERO
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn floor() -> LineSegment {
        // Perceptual y=600 is physics y=0
        LineSegment::from_pixels(0, 600, 600, 600)
    }

    #[test]
    fn test_new_world_defaults() {
        let world = World::default();
        let ball = world.ball_state();
        assert_eq!(ball.position, Vec2::new(200.0, 400.0));
        assert_eq!(ball.velocity, Vec2::ZERO);
        assert_eq!(ball.radius, 7.0);
        assert_eq!(world.wall_count(), 0);
        assert_eq!(world.gravity(), Vec2::new(0.0, -1000.0));

        let ball_body = world.body(world.ball_handle()).unwrap();
        assert_eq!(ball_body.mass, 40.0);
        assert!(world.body(world.anchor()).unwrap().is_static());
    }

    #[test]
    fn test_set_walls_converts_to_physics() {
        let mut world = World::default();
        let count = world
            .set_walls(&[LineSegment::from_pixels(10, 100, 50, 500)])
            .unwrap();
        assert_eq!(count, 1);

        let walls = world.wall_segments();
        assert_eq!(walls[0].a, Vec2::new(10.0, 500.0));
        assert_eq!(walls[0].b, Vec2::new(50.0, 100.0));
        assert_eq!(walls[0].body, world.anchor());
    }

    #[test]
    fn test_set_walls_replaces_whole_set() {
        let mut world = World::default();
        world
            .set_walls(&[floor(), LineSegment::from_pixels(0, 0, 0, 600)])
            .unwrap();
        assert_eq!(world.wall_count(), 2);

        world.set_walls(&[LineSegment::from_pixels(1, 2, 3, 4)]).unwrap();
        let walls = world.wall_segments();
        assert_eq!(walls.len(), 1);
        assert_eq!(walls[0].a, Vec2::new(1.0, 598.0));

        world.set_walls(&[]).unwrap();
        assert!(world.wall_segments().is_empty());
    }

    #[test]
    fn test_set_walls_rejects_non_finite_atomically() {
        let mut world = World::default();
        world.set_walls(&[floor()]).unwrap();
        let before = world.wall_segments();

        let err = world
            .set_walls(&[
                LineSegment::from_pixels(0, 0, 10, 10),
                LineSegment::new(0.0, f32::NAN, 5.0, 5.0),
                LineSegment::from_pixels(20, 20, 30, 30),
            ])
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidGeometry { index: 1, .. }));
        assert_eq!(world.wall_segments(), before);
    }

    #[test]
    fn test_step_rejects_bad_timestep() {
        let mut world = World::default();
        assert!(matches!(world.step(0.0), Err(SimError::InvalidTimestep(_))));
        assert!(matches!(world.step(f32::NAN), Err(SimError::InvalidTimestep(_))));
        assert_eq!(world.steps(), 0);
    }

    #[test]
    fn test_ball_falls_without_walls() {
        let mut world = World::default();
        world.step(SIM_DT).unwrap();
        let ball = world.ball_state();
        assert!(ball.position.y < 400.0);
        assert_eq!(ball.position.x, 200.0);
        assert_eq!(world.steps(), 1);
    }

    #[test]
    fn test_ball_lands_on_floor() {
        let mut world = World::default();
        for _ in 0..200 {
            world.set_walls(&[floor()]).unwrap();
            world.step(SIM_DT).unwrap();
            let y = world.ball_state().position.y;
            assert!(y >= 7.0 - 1e-3, "ball went through the floor: y={y}");
        }
    }

    #[test]
    fn test_ball_comes_to_rest() {
        let mut world = World::default();
        for _ in 0..3000 {
            world.set_walls(&[floor()]).unwrap();
            world.step(SIM_DT).unwrap();
        }
        let ball = world.ball_state();
        assert!(ball.velocity.y.abs() < 30.0);
        assert!((ball.position.y - 7.0).abs() < 1.0);
    }

    #[test]
    fn test_wall_swapped_in_under_ball_pushes_out() {
        let mut world = World::default();
        // Horizontal wall 3 units below the ball center
        world
            .set_walls(&[LineSegment::from_pixels(150, 203, 250, 203)])
            .unwrap();
        world.step(SIM_DT).unwrap();
        let ball = world.ball_state();
        assert!(ball.position.y >= 397.0 + 7.0 - 1e-3);
    }

    /// Two walls meeting at (200, 100) in physics space, opening upward
    fn funnel() -> [LineSegment; 2] {
        [
            LineSegment::from_pixels(100, 300, 200, 500),
            LineSegment::from_pixels(200, 500, 300, 300),
        ]
    }

    /// Height of the funnel walls at `x` (physics space)
    fn funnel_floor(x: f32) -> f32 {
        100.0 + 2.0 * (x - 200.0).abs()
    }

    #[test]
    fn test_ball_dropped_into_corner_never_passes_through() {
        let mut world = World::default();
        for step in 0..2000 {
            world.set_walls(&funnel()).unwrap();
            world.step(SIM_DT).unwrap();
            let p = world.ball_state().position;
            // Under the walls is only reachable by crossing one
            if (100.0..=300.0).contains(&p.x) {
                assert!(p.y > funnel_floor(p.x), "step {step}: ball below the funnel at {p:?}");
            }
        }
    }

    #[test]
    fn test_ball_settles_inside_corner() {
        let mut world = World::default();
        // Dropped from below the rim so it cannot bounce out
        world.set_ball_position(Vec2::new(200.0, 250.0));
        for step in 0..2000 {
            world.set_walls(&funnel()).unwrap();
            world.step(SIM_DT).unwrap();
            let p = world.ball_state().position;
            assert!(p.y > 107.0, "step {step}: ball reached the vertex at {p:?}");
            assert!(p.x > 100.0 && p.x < 300.0, "step {step}: ball left the funnel at {p:?}");
        }
    }

    #[test]
    fn test_overlap_push_never_crosses_another_wall() {
        let mut world = World::default();
        // Ball 5 units above the floor, centered on a second wall
        world.set_ball_position(Vec2::new(200.0, 5.0));
        let walls = [floor(), LineSegment::from_pixels(250, 595, 150, 595)];
        for _ in 0..10 {
            world.set_walls(&walls).unwrap();
            world.step(SIM_DT).unwrap();
            let y = world.ball_state().position.y;
            assert!(y > 0.0, "pushed through the floor: y={y}");
        }
    }

    #[test]
    fn test_sloped_wall_deflects_sideways() {
        let mut world = World::default();
        // Ramp falling to the right in physics space, under the ball
        let ramp = LineSegment::from_pixels(100, 400, 400, 500);
        for _ in 0..60 {
            world.set_walls(&[ramp]).unwrap();
            world.step(SIM_DT).unwrap();
        }
        assert!(world.ball_state().position.x > 200.0);
    }

    #[test]
    fn test_arena_walls_contain_ball() {
        let settings = Settings {
            arena_walls: true,
            ..Default::default()
        };
        let mut world = World::new(&settings);
        assert_eq!(world.boundary_segments().len(), 4);
        world.set_ball_velocity(Vec2::new(-900.0, 0.0));
        for _ in 0..500 {
            world.set_walls(&[]).unwrap();
            world.step(SIM_DT).unwrap();
            let p = world.ball_state().position;
            assert!(p.x >= 7.0 - 1e-3 && p.x <= 593.0 + 1e-3, "escaped at {p:?}");
            assert!(p.y >= 7.0 - 1e-3, "escaped at {p:?}");
        }
        assert!(
            world
                .last_contacts()
                .iter()
                .all(|c| matches!(c.surface, ContactSurface::Boundary(_)))
        );
    }

    #[test]
    fn test_divergence_reported() {
        let mut world = World::default();
        world.set_ball_velocity(Vec2::new(f32::INFINITY, 0.0));
        let err = world.step(SIM_DT).unwrap_err();
        assert!(matches!(err, SimError::SimulationDiverged { step: 1 }));
        assert!(err.is_fatal());

        // The failed step is not counted and the ball is not committed
        assert_eq!(world.steps(), 0);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.ball_state().position, Vec2::new(200.0, 400.0));
    }

    #[test]
    fn test_reset_ball() {
        let mut world = World::default();
        for _ in 0..10 {
            world.step(SIM_DT).unwrap();
        }
        world.reset_ball();
        let ball = world.ball_state();
        assert_eq!(ball.position, Vec2::new(200.0, 400.0));
        assert_eq!(ball.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_wall_snapshot_follows_rotated_anchor() {
        let mut world = World::default();
        world.set_walls(&[LineSegment::from_pixels(0, 600, 10, 600)]).unwrap();
        world.bodies[ANCHOR.0].pos = Vec2::new(5.0, 5.0);
        world.bodies[ANCHOR.0].angle = std::f32::consts::FRAC_PI_2;

        let wall = world.wall_segments()[0];
        assert!((wall.a - Vec2::new(5.0, 5.0)).length() < 1e-4);
        assert!((wall.b - Vec2::new(5.0, 15.0)).length() < 1e-4);
    }
}
