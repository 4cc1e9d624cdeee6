//! Line sources
//!
//! A line source stands in for the camera plus line detector: each call
//! yields one frame of detected segments in perceptual coordinates. The
//! detector itself is outside this crate; what lives here is the trait,
//! a replay source for recorded detections and a seeded synthetic source
//! that produces Hough-like noisy output.

use std::fs;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::error::Result;

/// A detected line in perceptual coordinates, stored as `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct LineSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LineSegment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer pixel endpoints, as line detectors report them
    pub fn from_pixels(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32)
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

impl From<[f32; 4]> for LineSegment {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<LineSegment> for [f32; 4] {
    fn from(l: LineSegment) -> Self {
        [l.x1, l.y1, l.x2, l.y2]
    }
}

/// One cycle's output from a line source
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Position in the source's sequence (0-based)
    pub sequence: u64,
    /// Detected lines in detection order; empty when nothing was found
    pub lines: Vec<LineSegment>,
    /// Raw image or diagnostic bytes, opaque to the simulation
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, lines: Vec<LineSegment>) -> Self {
        Self {
            sequence,
            lines,
            payload: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Producer of frames of detected lines
///
/// `next_frame` blocks until a frame is available. `Ok(None)` means a
/// finite source (a recording) has run out; live sources never return it.
/// Sources release whatever they hold (devices, files) when dropped.
pub trait LineSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: LineSource + ?Sized> LineSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// Wraps any iterator of per-frame line lists
pub struct IterSource<I> {
    iter: I,
    sequence: u64,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Vec<LineSegment>>,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
            sequence: 0,
        }
    }
}

impl<I> LineSource for IterSource<I>
where
    I: Iterator<Item = Vec<LineSegment>>,
{
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.iter.next().map(|lines| {
            let frame = Frame::new(self.sequence, lines);
            self.sequence += 1;
            frame
        }))
    }
}

/// On-disk format of a recorded detection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recording {
    /// Lines per frame, in capture order
    pub frames: Vec<Vec<LineSegment>>,
}

impl Recording {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Plays back recorded detections
pub struct ReplaySource {
    frames: Vec<Vec<LineSegment>>,
    cursor: usize,
    sequence: u64,
    /// Start over after the last frame instead of ending
    looped: bool,
}

impl ReplaySource {
    pub fn new(recording: Recording, looped: bool) -> Self {
        Self {
            frames: recording.frames,
            cursor: 0,
            sequence: 0,
            looped,
        }
    }

    pub fn from_path(path: impl AsRef<Path>, looped: bool) -> Result<Self> {
        let path = path.as_ref();
        let recording = Recording::load(path)?;
        log::info!(
            "Loaded {} recorded frames from {}",
            recording.frames.len(),
            path.display()
        );
        Ok(Self::new(recording, looped))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LineSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.frames.len() {
            if !self.looped || self.frames.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let frame = Frame::new(self.sequence, self.frames[self.cursor].clone());
        self.cursor += 1;
        self.sequence += 1;
        Ok(Some(frame))
    }
}

/// Seeded stand-in for a live camera and detector
///
/// Each frame reports a floor broken into a few fragments and a sloped
/// ramp, with every endpoint jittered by a few pixels the way a Hough
/// transform wobbles between frames. Some frames detect nothing at all.
pub struct SyntheticSource {
    rng: Pcg32,
    sequence: u64,
    width: f32,
    height: f32,
    /// Probability of a frame with no detections
    pub dropout: f64,
    /// Maximum endpoint jitter in pixels
    pub jitter: f32,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self::with_size(seed, DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    pub fn with_size(seed: u64, width: f32, height: f32) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            sequence: 0,
            width,
            height,
            dropout: 0.05,
            jitter: 2.0,
        }
    }

    fn jittered(&mut self, v: f32) -> f32 {
        if self.jitter <= 0.0 {
            return v.round();
        }
        (v + self.rng.random_range(-self.jitter..=self.jitter)).round()
    }

    fn detect(&mut self) -> Vec<LineSegment> {
        if self.rng.random_bool(self.dropout) {
            return Vec::new();
        }

        let mut lines = Vec::new();

        // Floor near the bottom edge, split into fragments
        let floor_y = self.height * 0.95;
        let fragments = self.rng.random_range(1..=3u32);
        let span = self.width / fragments as f32;
        for i in 0..fragments {
            let x1 = span * i as f32;
            let x2 = x1 + span;
            let (y1, y2) = (self.jittered(floor_y), self.jittered(floor_y));
            lines.push(LineSegment::new(self.jittered(x1), y1, self.jittered(x2), y2));
        }

        // Ramp sloping down to the right, under the ball's spawn column
        let ramp = [
            self.width * 0.15,
            self.height * 0.55,
            self.width * 0.6,
            self.height * 0.75,
        ];
        let ramp = ramp.map(|v| self.jittered(v));
        lines.push(LineSegment::from(ramp));

        lines
    }
}

impl LineSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = Frame::new(self.sequence, self.detect());
        self.sequence += 1;
        Ok(Some(frame))
    }
}
