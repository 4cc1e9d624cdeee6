//! Presentation contract
//!
//! Each loop iteration hands a `FrameSnapshot` (physics space) to a
//! `Presenter`. Drawing is someone else's job; the presenters here log
//! the ball, write a JSON-lines trace in display coordinates, or keep the
//! snapshots in memory.

use std::io::{BufWriter, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sim::{BallState, WallSegment, World};
use crate::transform::CoordinateTransform;

/// State handed to presentation after a step
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// Steps completed so far
    pub step: u64,
    /// Simulated time in seconds
    pub time: f64,
    /// Sequence number of the frame whose lines were used
    pub sequence: u64,
    pub ball: BallState,
    pub walls: Vec<WallSegment>,
    /// Contacts resolved during this step
    pub contacts: usize,
}

impl FrameSnapshot {
    pub fn capture(world: &World, sequence: u64) -> Self {
        Self {
            step: world.steps(),
            time: world.time(),
            sequence,
            ball: world.ball_state(),
            walls: world.wall_segments(),
            contacts: world.last_contacts().len(),
        }
    }

    /// Convert to display coordinates
    pub fn to_perceptual(&self, transform: &CoordinateTransform) -> PerceptualSnapshot {
        let (x, y) = transform.to_perceptual(self.ball.position);
        PerceptualSnapshot {
            step: self.step,
            time: self.time,
            ball: PerceptualBall {
                x,
                y,
                radius: self.ball.radius,
                angle: self.ball.angle,
            },
            walls: self
                .walls
                .iter()
                .map(|w| {
                    let (x1, y1) = transform.to_perceptual(w.a);
                    let (x2, y2) = transform.to_perceptual(w.b);
                    [x1, y1, x2, y2]
                })
                .collect(),
        }
    }
}

/// Ball in display pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptualBall {
    pub x: i32,
    pub y: i32,
    pub radius: f32,
    pub angle: f32,
}

/// Snapshot in display pixels, one line of a trace file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptualSnapshot {
    pub step: u64,
    pub time: f64,
    pub ball: PerceptualBall,
    /// `[x1, y1, x2, y2]` per wall
    pub walls: Vec<[i32; 4]>,
}

/// Consumer of per-iteration state
///
/// Presenters release their resources (windows, files) when dropped.
pub trait Presenter {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()>;

    /// Called once when a run ends, on every exit path
    ///
    /// Buffered output must be written out here so failures surface as errors.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        (**self).present(snapshot)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        (**self).present(snapshot)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Both presenters, in order
impl<A: Presenter, B: Presenter> Presenter for (A, B) {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        self.0.present(snapshot)?;
        self.1.present(snapshot)
    }

    /// Both are finished even if the first fails
    fn finish(&mut self) -> Result<()> {
        let first = self.0.finish();
        let second = self.1.finish();
        first.and(second)
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _snapshot: &FrameSnapshot) -> Result<()> {
        Ok(())
    }
}

/// Logs the ball position every frame
#[derive(Debug, Default)]
pub struct LogPresenter {
    transform: CoordinateTransform,
}

impl LogPresenter {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }
}

impl Presenter for LogPresenter {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        let (x, y) = self.transform.to_perceptual(snapshot.ball.position);
        log::info!(
            "step {} frame {}: ball ({}, {}) walls {} contacts {}",
            snapshot.step,
            snapshot.sequence,
            x,
            y,
            snapshot.walls.len(),
            snapshot.contacts
        );
        Ok(())
    }
}

/// Writes one JSON line per frame in display coordinates
pub struct TraceWriter<W: Write> {
    out: BufWriter<W>,
    transform: CoordinateTransform,
    written: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W, transform: CoordinateTransform) -> Self {
        Self {
            out: BufWriter::new(out),
            transform,
            written: 0,
        }
    }

    /// Lines written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Underlying writer; holds only what has been flushed
    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> Presenter for TraceWriter<W> {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.out, &snapshot.to_perceptual(&self.transform))?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        log::debug!("Trace flushed after {} frames", self.written);
        Ok(())
    }
}

/// Keeps every snapshot in memory
#[derive(Debug, Default)]
pub struct Recorder {
    pub snapshots: Vec<FrameSnapshot>,
}

impl Presenter for Recorder {
    fn present(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}
