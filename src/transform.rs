//! Physics space <-> perceptual space
//!
//! Physics space has its origin bottom-left with +y up. Perceptual space
//! (video frames, display) has its origin top-left with +y down. The two
//! only differ by a vertical flip about the display height.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::DISPLAY_HEIGHT;

/// Vertical flip for a display of fixed height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    pub height: f32,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            height: DISPLAY_HEIGHT,
        }
    }
}

impl CoordinateTransform {
    pub fn new(height: f32) -> Self {
        Self { height }
    }

    /// Physics point to integer display pixel
    #[inline]
    pub fn to_perceptual(&self, p: Vec2) -> (i32, i32) {
        (p.x.round() as i32, (self.height - p.y).round() as i32)
    }

    /// Display point to physics space
    ///
    /// Detector output is integral, but any real pixel position maps exactly.
    #[inline]
    pub fn to_physics(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x, self.height - y)
    }
}

/// `to_perceptual` at the reference display height
#[inline]
pub fn to_perceptual(p: Vec2) -> (i32, i32) {
    CoordinateTransform::default().to_perceptual(p)
}

/// `to_physics` at the reference display height
#[inline]
pub fn to_physics(x: f32, y: f32) -> Vec2 {
    CoordinateTransform::default().to_physics(x, y)
}
