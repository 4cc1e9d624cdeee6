//! Edge Bounce - a ball in an arena drawn by a line detector
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bodies, collisions, world, loop)
//! - `transform`: Physics space <-> perceptual (display) space
//! - `source`: Line source collaborators (replay, synthetic)
//! - `present`: Presentation contract and snapshot sinks
//! - `settings`: Reference configuration, JSON load/save

pub mod error;
pub mod present;
pub mod settings;
pub mod sim;
pub mod source;
pub mod transform;

pub use error::{Result, SimError};
pub use present::{FrameSnapshot, LogPresenter, NullPresenter, Presenter, TraceWriter};
pub use settings::Settings;
pub use sim::{BallState, RunFlag, SimulationLoop, WallSegment, World};
pub use source::{Frame, IterSource, LineSegment, LineSource, ReplaySource, SyntheticSource};
pub use transform::{CoordinateTransform, to_perceptual, to_physics};

use glam::Vec2;

/// Reference configuration constants
pub mod consts {
    /// Fixed simulation timestep (50 Hz)
    pub const SIM_DT: f32 = 0.02;
    /// Maximum swept-collision passes within one step
    pub const MAX_CCD_ITERATIONS: u32 = 8;

    /// Display dimensions (perceptual space)
    pub const DISPLAY_WIDTH: f32 = 600.0;
    pub const DISPLAY_HEIGHT: f32 = 600.0;

    /// Gravity (physics space, units/s²)
    pub const GRAVITY_Y: f32 = -1000.0;

    /// Ball defaults
    pub const BALL_MASS: f32 = 40.0;
    pub const BALL_RADIUS: f32 = 7.0;
    pub const BALL_RESTITUTION: f32 = 0.95;
    pub const BALL_START_X: f32 = 200.0;
    pub const BALL_START_Y: f32 = 400.0;

    /// Contacts slower than this (normal speed, units/s) do not bounce
    pub const RESTING_SPEED: f32 = 30.0;
    /// Gap left between ball and surface after a contact is resolved
    pub const CONTACT_SLOP: f32 = 0.01;
}

/// Moment of inertia of a uniform disk about its center
#[inline]
pub fn moment_for_disk(mass: f32, radius: f32) -> f32 {
    0.5 * mass * radius * radius
}

/// Left-hand perpendicular of a vector
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// True if both components are finite
#[inline]
pub fn is_finite_vec(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
