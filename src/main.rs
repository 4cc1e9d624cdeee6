//! Edge Bounce entry point
//!
//! Runs the simulation loop against a recorded or synthetic line source
//! and reports the ball each frame.

use std::fs::File;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use edge_bounce::present::{LogPresenter, NullPresenter, Presenter, TraceWriter};
use edge_bounce::sim::{RunFlag, SimulationLoop, World};
use edge_bounce::source::{LineSource, ReplaySource, SyntheticSource};
use edge_bounce::{Result, Settings};

#[derive(Parser)]
#[command(name = "edge-bounce")]
#[command(about = "A ball bouncing off walls detected in a video feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation loop
    Run(RunArgs),
    /// Print the default settings as JSON
    Settings,
}

#[derive(Args)]
struct RunArgs {
    /// Settings file (JSON); defaults to the reference configuration
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Recorded detections to replay instead of the synthetic source
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Start the recording over when it ends
    #[arg(long = "loop")]
    looped: bool,
    /// Seed for the synthetic source
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
    /// Write a JSON-lines trace of every frame
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Pace the loop to one frame per timestep of wall-clock time
    #[arg(long)]
    realtime: bool,
    /// Surround the display with boundary walls
    #[arg(long)]
    arena: bool,
    /// Keep previous walls when a frame has invalid geometry
    #[arg(long)]
    skip_invalid: bool,
    /// Don't log every frame
    #[arg(long)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Settings => Settings::default().to_json().map(|json| println!("{json}")),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if args.arena {
        settings.arena_walls = true;
    }
    if args.realtime && settings.target_fps.is_none() {
        settings.target_fps = Some(1.0 / settings.dt);
    }

    let source: Box<dyn LineSource> = match &args.replay {
        Some(path) => Box::new(ReplaySource::from_path(path, args.looped)?),
        None => {
            log::info!("Using synthetic line source (seed {})", args.seed);
            Box::new(SyntheticSource::with_size(
                args.seed,
                settings.display_width,
                settings.display_height,
            ))
        }
    };

    let transform = settings.transform();
    let log_presenter: Box<dyn Presenter> = if args.quiet {
        Box::new(NullPresenter)
    } else {
        Box::new(LogPresenter::new(transform))
    };
    let trace: Box<dyn Presenter> = match &args.trace {
        Some(path) => Box::new(TraceWriter::new(File::create(path)?, transform)),
        None => Box::new(NullPresenter),
    };

    let mut sim_loop = SimulationLoop::from_settings(&settings);
    sim_loop.max_iterations = args.frames;
    sim_loop.skip_invalid_frames = args.skip_invalid;

    let running = RunFlag::new();
    let on_interrupt = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Interrupted, finishing the current frame");
        on_interrupt.stop();
    }) {
        log::warn!("Ctrl-C handler not installed: {}", e);
    }

    let mut world = World::new(&settings);
    let summary = sim_loop.run(&mut world, source, (log_presenter, trace), &running)?;

    let (x, y) = transform.to_perceptual(summary.ball.position);
    println!(
        "{} frames, {:.2}s simulated, {} rejected, ball at ({}, {}), stopped: {:?}",
        summary.iterations,
        summary.simulated_time,
        summary.rejected_frames,
        x,
        y,
        summary.reason
    );
    Ok(())
}
