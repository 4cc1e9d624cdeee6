//! Bodies and the shapes attached to them
//!
//! Shapes never own their body. They carry a `BodyHandle` into the
//! world's body table, and bodies are never removed from that table, so a
//! handle held by any shape always resolves.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::moment_for_disk;

/// Index into the world's body table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub(crate) usize);

impl BodyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Integrated every step
    Dynamic,
    /// Immovable reference frame (infinite mass)
    Static,
}

/// A rigid body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    /// Mass (0 for static bodies)
    pub mass: f32,
    /// Moment of inertia (0 for static bodies)
    pub moment: f32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Rotation (radians, counter-clockwise)
    pub angle: f32,
    pub angular_vel: f32,
}

impl Body {
    /// Dynamic disk body at rest
    pub fn dynamic_disk(mass: f32, radius: f32, pos: Vec2) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass,
            moment: moment_for_disk(mass, radius),
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
        }
    }

    /// Zero-mass, zero-velocity anchor at the origin
    pub fn anchor() -> Self {
        Self {
            kind: BodyKind::Static,
            mass: 0.0,
            moment: 0.0,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    /// Inverse mass (0 for static bodies)
    #[inline]
    pub fn inv_mass(&self) -> f32 {
        if self.is_static() || self.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Map a point from this body's local frame into world space
    #[inline]
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.pos + Vec2::from_angle(self.angle).rotate(local)
    }

    /// Map a world-space point into this body's local frame
    #[inline]
    pub fn world_to_local(&self, world: Vec2) -> Vec2 {
        Vec2::from_angle(-self.angle).rotate(world - self.pos)
    }

    /// Translational plus rotational kinetic energy
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.vel.length_squared()
            + 0.5 * self.moment * self.angular_vel * self.angular_vel
    }

    /// Position, velocity and angle are all finite
    pub fn is_finite(&self) -> bool {
        crate::is_finite_vec(self.pos)
            && crate::is_finite_vec(self.vel)
            && self.angle.is_finite()
            && self.angular_vel.is_finite()
    }
}

/// Circle collision shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub body: BodyHandle,
    pub radius: f32,
    /// Offset of the center in the body's frame
    pub offset: Vec2,
    /// Fraction of normal speed kept after a contact
    pub restitution: f32,
}

/// Line segment collision shape (zero thickness, two-sided)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub body: BodyHandle,
    /// Endpoint A in the body's frame
    pub a: Vec2,
    /// Endpoint B in the body's frame
    pub b: Vec2,
    pub thickness: f32,
}

impl Segment {
    pub fn new(body: BodyHandle, a: Vec2, b: Vec2) -> Self {
        Self {
            body,
            a,
            b,
            thickness: 0.0,
        }
    }

    /// Endpoints in world space for the given owning body
    #[inline]
    pub fn world_endpoints(&self, owner: &Body) -> (Vec2, Vec2) {
        (owner.local_to_world(self.a), owner.local_to_world(self.b))
    }
}
