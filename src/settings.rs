//! Simulation settings
//!
//! Defaults reproduce the reference configuration. Settings can be read
//! from a JSON file; missing fields fall back to their defaults.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};
use crate::transform::CoordinateTransform;

/// Ball parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallSettings {
    pub mass: f32,
    pub radius: f32,
    /// Fraction of normal speed kept on contact (1.0 = perfectly elastic)
    pub restitution: f32,
    /// Spawn position (physics space)
    pub start: Vec2,
}

impl Default for BallSettings {
    fn default() -> Self {
        Self {
            mass: BALL_MASS,
            radius: BALL_RADIUS,
            restitution: BALL_RESTITUTION,
            start: Vec2::new(BALL_START_X, BALL_START_Y),
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display width (perceptual space)
    pub display_width: f32,
    /// Display height; also the flip axis of the coordinate transform
    pub display_height: f32,
    /// Fixed timestep in seconds
    pub dt: f32,
    /// Gravity (physics space)
    pub gravity: Vec2,
    pub ball: BallSettings,
    /// Restitution of wall segments, multiplied with the ball's
    pub wall_restitution: f32,
    /// Contacts slower than this do not bounce
    pub resting_speed: f32,
    /// Surround the display with permanent boundary walls
    pub arena_walls: bool,
    /// Real-time loop rate for the binary (None = run as fast as frames arrive)
    pub target_fps: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_width: DISPLAY_WIDTH,
            display_height: DISPLAY_HEIGHT,
            dt: SIM_DT,
            gravity: Vec2::new(0.0, GRAVITY_Y),
            ball: BallSettings::default(),
            wall_restitution: 1.0,
            resting_speed: RESTING_SPEED,
            arena_walls: false,
            target_fps: None,
        }
    }
}

impl Settings {
    /// Coordinate transform for this display
    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(self.display_height)
    }

    /// Parse and validate settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the world or the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        positive("display_width", self.display_width)?;
        positive("display_height", self.display_height)?;
        positive("dt", self.dt)?;
        finite_vec("gravity", self.gravity)?;
        positive("ball.mass", self.ball.mass)?;
        positive("ball.radius", self.ball.radius)?;
        unit_range("ball.restitution", self.ball.restitution)?;
        finite_vec("ball.start", self.ball.start)?;
        unit_range("wall_restitution", self.wall_restitution)?;
        if !self.resting_speed.is_finite() || self.resting_speed < 0.0 {
            return Err(invalid("resting_speed", self.resting_speed, "must be finite and >= 0"));
        }
        if let Some(fps) = self.target_fps {
            if !(MIN_TARGET_FPS..=f32::MAX).contains(&fps) {
                return Err(invalid(
                    "target_fps",
                    fps,
                    &format!("must be at least {MIN_TARGET_FPS}"),
                ));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

/// Slowest pacing rate accepted from a settings file
const MIN_TARGET_FPS: f32 = 0.001;

fn invalid(field: &'static str, value: impl std::fmt::Debug, rule: &str) -> SimError {
    SimError::InvalidSettings {
        field,
        reason: format!("{value:?} {rule}"),
    }
}

fn positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite and > 0"))
    }
}

fn unit_range(field: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, "must be within [0, 1]"))
    }
}

fn finite_vec(field: &'static str, value: Vec2) -> Result<()> {
    if crate::is_finite_vec(value) {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}
