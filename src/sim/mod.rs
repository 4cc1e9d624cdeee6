//! Deterministic simulation module
//!
//! All physics lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (walls in detection order, then boundary)
//! - No rendering or capture dependencies

pub mod body;
pub mod collision;
pub mod run;
pub mod world;

pub use body::{Body, BodyHandle, BodyKind, Circle, Segment};
pub use collision::{
    CollisionResult, TimeOfImpact, bounce_velocity, circle_segment_collision,
    closest_point_on_segment, sweep_circle_segment,
};
pub use run::{Iteration, RunFlag, RunSummary, SimulationLoop, StopReason};
pub use world::{BallState, ContactEvent, ContactSurface, WallSegment, World};
