//! Fixed timestep simulation loop
//!
//! One iteration pulls a frame of lines, swaps them in as walls, steps the
//! world by the fixed timestep and hands the result to presentation. The
//! step size never depends on how long the frame took to arrive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::world::{BallState, World};
use crate::consts::SIM_DT;
use crate::error::Result;
use crate::present::{FrameSnapshot, Presenter};
use crate::settings::Settings;
use crate::source::LineSource;

/// Shared run/stop signal, checked once per iteration
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    /// A flag in the running state
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The run flag was cleared
    Stopped,
    /// A finite source ran out of frames
    SourceEnded,
    /// The configured iteration cap was reached
    IterationLimit,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub iterations: u64,
    pub simulated_time: f64,
    /// Frames whose lines were rejected and skipped
    pub rejected_frames: u64,
    pub ball: BallState,
    pub reason: StopReason,
}

/// Result of a single iteration
#[derive(Debug, Clone, PartialEq)]
pub enum Iteration {
    /// The world advanced; `walls_rejected` is set when the frame's lines
    /// were invalid and the previous walls were kept
    Advanced { walls_rejected: bool },
    /// The source has no more frames; the world was not stepped
    SourceEnded,
}

/// Drives the world from a line source
#[derive(Debug, Clone)]
pub struct SimulationLoop {
    /// Fixed timestep in seconds
    pub dt: f32,
    /// Stop after this many iterations
    pub max_iterations: Option<u64>,
    /// Minimum wall-clock time per iteration (real-time pacing)
    pub pacing: Option<Duration>,
    /// Keep the previous walls when a frame carries invalid geometry
    /// instead of ending the run
    pub skip_invalid_frames: bool,
}

impl Default for SimulationLoop {
    fn default() -> Self {
        Self::new(SIM_DT)
    }
}

impl SimulationLoop {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            max_iterations: None,
            pacing: None,
            skip_invalid_frames: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut sim_loop = Self::new(settings.dt);
        sim_loop.pacing = settings
            .target_fps
            .filter(|fps| *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok());
        sim_loop
    }

    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_pacing(mut self, per_iteration: Duration) -> Self {
        self.pacing = Some(per_iteration);
        self
    }

    pub fn skipping_invalid_frames(mut self) -> Self {
        self.skip_invalid_frames = true;
        self
    }

    /// Run one cycle: next frame, replace walls, step, present
    pub fn iterate<S, P>(
        &self,
        world: &mut World,
        source: &mut S,
        presenter: &mut P,
    ) -> Result<Iteration>
    where
        S: LineSource + ?Sized,
        P: Presenter + ?Sized,
    {
        let Some(frame) = source.next_frame()? else {
            return Ok(Iteration::SourceEnded);
        };

        let mut walls_rejected = false;
        match world.set_walls(&frame.lines) {
            Ok(count) => log::trace!("frame {}: {} walls", frame.sequence, count),
            Err(e) if self.skip_invalid_frames => {
                log::warn!("frame {} rejected, keeping previous walls: {}", frame.sequence, e);
                walls_rejected = true;
            }
            Err(e) => return Err(e),
        }

        world.step(self.dt)?;
        presenter.present(&FrameSnapshot::capture(world, frame.sequence))?;

        Ok(Iteration::Advanced { walls_rejected })
    }

    /// Run until the flag clears, the source ends, or the iteration cap
    ///
    /// Source and presenter are owned by the run and dropped on every
    /// exit path, errors included. The presenter is finished first, so
    /// buffered output is written out and its failure is reported.
    pub fn run<S, P>(
        &self,
        world: &mut World,
        mut source: S,
        mut presenter: P,
        running: &RunFlag,
    ) -> Result<RunSummary>
    where
        S: LineSource,
        P: Presenter,
    {
        log::info!("Simulation loop starting (dt = {}s)", self.dt);

        let mut tally = Tally::default();
        let driven = self.drive(world, &mut source, &mut presenter, running, &mut tally);
        // The run's own error wins over a failure to finish
        let finished = presenter.finish();
        let reason = driven?;
        finished?;

        log::info!(
            "Simulation loop finished after {} iterations ({:?})",
            tally.iterations,
            reason
        );

        Ok(RunSummary {
            iterations: tally.iterations,
            simulated_time: world.time(),
            rejected_frames: tally.rejected_frames,
            ball: world.ball_state(),
            reason,
        })
    }

    fn drive<S, P>(
        &self,
        world: &mut World,
        source: &mut S,
        presenter: &mut P,
        running: &RunFlag,
        tally: &mut Tally,
    ) -> Result<StopReason>
    where
        S: LineSource,
        P: Presenter,
    {
        loop {
            if !running.is_running() {
                return Ok(StopReason::Stopped);
            }
            if self.max_iterations.is_some_and(|max| tally.iterations >= max) {
                return Ok(StopReason::IterationLimit);
            }

            let started = Instant::now();
            match self.iterate(world, source, presenter)? {
                Iteration::SourceEnded => return Ok(StopReason::SourceEnded),
                Iteration::Advanced { walls_rejected } => {
                    tally.iterations += 1;
                    if walls_rejected {
                        tally.rejected_frames += 1;
                    }
                }
            }

            if let Some(period) = self.pacing {
                let elapsed = started.elapsed();
                if elapsed < period {
                    thread::sleep(period - elapsed);
                }
            }
        }
    }
}

/// Counters kept across iterations of a run
#[derive(Debug, Default)]
struct Tally {
    iterations: u64,
    rejected_frames: u64,
}
