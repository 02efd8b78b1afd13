//! Agent Society Simulation Runner
//!
//! Headless command line runner: builds (or restores) a world, runs it for
//! a number of ticks and writes metrics, events, a final snapshot and an
//! optional checkpoint.

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use society_core::config::DEFAULT_CONFIG_PATH;
use society_core::persistence::load_checkpoint;
use society_core::systems::living_count;
use society_core::{PopulationStats, SimConfig, SimError, Simulation, SpeedMode};
use society_events::generate_run_id;

/// Ticks between progress log lines
const PROGRESS_INTERVAL: u64 = 100;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "society_sim")]
#[command(about = "A 2D society of learning agents that farm, work, trade and evolve")]
struct Args {
    /// Random seed for reproducibility (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 1000)]
    ticks: u64,

    /// TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Config override as section.field=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Speed mode: normal, fast, faster or fastest
    #[arg(long)]
    speed: Option<SpeedMode>,

    /// Resume from this checkpoint instead of building a new world
    #[arg(long)]
    checkpoint_in: Option<PathBuf>,

    /// Write a checkpoint here when the run ends
    #[arg(long)]
    checkpoint_out: Option<PathBuf>,

    /// Write the sampled metrics history here as JSON
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Append interaction events here as JSONL
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Write the final render snapshot here as JSON
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(args: &Args) -> Result<SimConfig, SimError> {
    let mut config = SimConfig::load_or_default(&args.config)?;
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }
    if let Some(speed) = args.speed {
        config.scheduler.speed_mode = speed;
    }
    config.apply_overrides(&args.overrides)?;
    Ok(config)
}

fn build_simulation(args: &Args, config: SimConfig) -> Result<Simulation, SimError> {
    match &args.checkpoint_in {
        Some(path) => {
            let world = load_checkpoint(path)?;
            let mut restored = world.get_resource::<SimConfig>().cloned().unwrap_or_else(|| config.clone());
            restored.scheduler.speed_mode = config.scheduler.speed_mode;
            Ok(Simulation::from_world(world, restored))
        }
        None => Simulation::new(config),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SimError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    fs::write(path, json)?;
    Ok(())
}

fn main() -> Result<(), SimError> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = load_config(&args)?;
    let mut sim = build_simulation(&args, config)?;
    if let Some(path) = &args.events_out {
        sim.set_event_log(path)?;
    }

    let start_tick = sim.tick();
    tracing::info!(
        run_id = %generate_run_id(),
        seed = sim.config().world.seed,
        ticks = args.ticks,
        start_tick,
        speed = %sim.speed_mode(),
        "starting simulation"
    );

    for done in 1..=args.ticks {
        sim.step_resilient()?;
        if done % PROGRESS_INTERVAL == 0 {
            let alive = living_count(sim.world_mut());
            let epoch = sim.world().resource::<PopulationStats>().epoch;
            tracing::info!(tick = sim.tick(), alive, epoch, "progress");
        }
    }

    if let Some(path) = &args.metrics_out {
        sim.metrics().export_json(path)?;
        tracing::info!(path = %path.display(), samples = sim.metrics().len(), "metrics written");
    }
    if let Some(path) = &args.snapshot_out {
        let snapshot = sim.snapshot();
        write_json(path, &snapshot)?;
    }
    if let Some(path) = &args.checkpoint_out {
        sim.save_checkpoint(path)?;
    }

    let stats = sim.world().resource::<PopulationStats>().clone();
    let alive = living_count(sim.world_mut());
    println!();
    println!("Simulation complete. Ran {} ticks (now at tick {}).", args.ticks, sim.tick());
    println!(
        "  Epoch {}: {} alive, {} births and {} deaths in total.",
        stats.epoch, alive, stats.total_births, stats.total_deaths
    );
    Ok(())
}
