//! Simulation Scheduler
//!
//! One tick is a chained bevy `Schedule` of exclusive systems. Systems with
//! a base interval only run when `FrameScheduler::is_due` says so, and the
//! active speed mode stretches those intervals. `Simulation` owns the world
//! and schedule and wraps every tick in the self-healing failure policy.

pub mod runner;
pub mod speed;

pub use runner::{SimCommand, SimStatus, SimulationHandle};
pub use speed::{RenderDetail, SpeedMode, SpeedProfile};

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use society_events::{MetricsSample, PerformanceMetrics, RenderSnapshot};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::components::SimClock;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::events::{flush_events, EventLogger};
use crate::output::metrics::MetricsCollector;
use crate::output::render::build_render_snapshot_with;
use crate::persistence::{load_checkpoint, save_checkpoint};
use crate::setup::init_world;
use crate::systems::{
    age_agents, decay_relationships, grow_farms, process_social_events, reap_dead, restart_epoch_if_extinct,
    run_agent_decisions, update_social_status, update_workplaces,
};
use crate::with_rng;

/// Frame timings kept for the rolling averages
const FRAME_WINDOW: usize = 60;
/// Auto-optimization speeds up below this share of the target fps
const SLOW_FPS_RATIO: f32 = 0.8;
/// and slows down above this share
const FAST_FPS_RATIO: f32 = 1.2;

/// Resource: tick counter, speed mode and performance counters
#[derive(Resource, Debug, Clone)]
pub struct FrameScheduler {
    mode: SpeedMode,
    profile: SpeedProfile,
    /// Ticks executed since the scheduler was created
    ticks_run: u64,
    frames: u64,
    /// (frame duration, ticks in that frame)
    frame_times: VecDeque<(Duration, u32)>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(SpeedMode::Normal)
    }
}

impl FrameScheduler {
    pub fn new(mode: SpeedMode) -> Self {
        Self {
            mode,
            profile: mode.profile(),
            ticks_run: 0,
            frames: 0,
            frame_times: VecDeque::with_capacity(FRAME_WINDOW),
        }
    }

    pub fn mode(&self) -> SpeedMode {
        self.mode
    }

    pub fn profile(&self) -> SpeedProfile {
        self.profile
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether a system with this base interval runs on the current tick
    pub fn is_due(&self, base_interval: u64) -> bool {
        self.ticks_run % self.profile.interval(base_interval) == 0
    }

    /// Marks the end of one tick.
    pub fn advance(&mut self) {
        self.ticks_run += 1;
    }

    pub fn set_mode(&mut self, mode: SpeedMode) {
        if mode != self.mode {
            tracing::info!(from = %self.mode, to = %mode, "speed mode changed");
        }
        self.mode = mode;
        self.profile = mode.profile();
    }

    pub fn record_frame(&mut self, elapsed: Duration, ticks: u32) {
        self.frames += 1;
        if self.frame_times.len() == FRAME_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back((elapsed, ticks));
    }

    /// Whether the frame just recorded should publish a render snapshot
    pub fn should_render(&self) -> bool {
        self.profile.render_detail != RenderDetail::Headless
            && self.frames % u64::from(self.profile.render_every.max(1)) == 0
    }

    pub fn avg_frame_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        let total: Duration = self.frame_times.iter().map(|(d, _)| *d).sum();
        total.as_secs_f32() * 1000.0 / self.frame_times.len() as f32
    }

    pub fn fps(&self) -> f32 {
        let ms = self.avg_frame_ms();
        if ms > 0.0 {
            1000.0 / ms
        } else {
            0.0
        }
    }

    pub fn iterations_per_second(&self) -> f32 {
        let secs: f32 = self.frame_times.iter().map(|(d, _)| d.as_secs_f32()).sum();
        let ticks: u32 = self.frame_times.iter().map(|(_, t)| *t).sum();
        if secs > 0.0 {
            ticks as f32 / secs
        } else {
            0.0
        }
    }

    /// Steps the speed mode toward `target_fps`. Returns the new mode if it
    /// changed.
    pub fn auto_optimize(&mut self, target_fps: f32) -> Option<SpeedMode> {
        if self.frame_times.is_empty() || target_fps <= 0.0 {
            return None;
        }
        let fps = self.fps();
        let next = if fps < target_fps * SLOW_FPS_RATIO {
            self.mode.faster()
        } else if fps > target_fps * FAST_FPS_RATIO {
            self.mode.slower()
        } else {
            self.mode
        };
        if next == self.mode {
            return None;
        }
        self.set_mode(next);
        self.frame_times.clear();
        Some(next)
    }

    pub fn performance(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            speed_mode: self.mode.label().to_string(),
            steps_per_frame: self.profile.steps_per_frame,
            avg_frame_ms: self.avg_frame_ms(),
            iterations_per_second: self.iterations_per_second(),
            ticks_run: self.ticks_run,
        }
    }
}

// Run conditions

fn economy_due(scheduler: Res<FrameScheduler>, config: Res<SimConfig>) -> bool {
    scheduler.is_due(config.scheduler.economy_interval)
}

fn agriculture_due(scheduler: Res<FrameScheduler>, config: Res<SimConfig>) -> bool {
    scheduler.is_due(config.scheduler.agriculture_interval)
}

fn social_due(scheduler: Res<FrameScheduler>, config: Res<SimConfig>) -> bool {
    scheduler.is_due(config.scheduler.social_interval)
}

// Exclusive systems

fn reap_system(world: &mut World) {
    reap_dead(world);
}

fn epoch_system(world: &mut World) {
    with_rng(world, |world, rng| restart_epoch_if_extinct(world, rng));
}

fn decision_system(world: &mut World) {
    with_rng(world, |world, rng| run_agent_decisions(world, rng));
}

fn social_event_system(world: &mut World) {
    process_social_events(world);
}

fn economy_system(world: &mut World) {
    with_rng(world, |world, rng| update_workplaces(world, rng));
}

fn agriculture_system(world: &mut World) {
    grow_farms(world);
}

fn relationship_system(world: &mut World) {
    decay_relationships(world);
    with_rng(world, |world, rng| update_social_status(world, rng));
}

fn aging_system(world: &mut World) {
    age_agents(world);
}

fn clock_system(mut clock: ResMut<SimClock>, mut scheduler: ResMut<FrameScheduler>) {
    clock.advance();
    scheduler.advance();
}

/// The per-tick system order
pub fn build_tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            reap_system,
            epoch_system,
            decision_system,
            social_event_system.run_if(social_due),
            economy_system.run_if(economy_due),
            agriculture_system.run_if(agriculture_due),
            relationship_system.run_if(social_due),
            aging_system,
            clock_system,
        )
            .chain(),
    );
    schedule
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A world, its tick schedule and its metrics history
pub struct Simulation {
    world: World,
    schedule: Schedule,
    config: SimConfig,
    metrics: MetricsCollector,
    consecutive_failures: u32,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let world = init_world(&config);
        Ok(Self::from_world(world, config))
    }

    /// Wraps an existing world, e.g. one restored from a checkpoint.
    pub fn from_world(mut world: World, config: SimConfig) -> Self {
        if !world.contains_resource::<FrameScheduler>() {
            world.insert_resource(FrameScheduler::new(config.scheduler.speed_mode));
        }
        Self {
            world,
            schedule: build_tick_schedule(),
            metrics: MetricsCollector::new(&config.metrics),
            config,
            consecutive_failures: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.world.get_resource::<SimClock>().map_or(0, |c| c.tick)
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn scheduler(&self) -> FrameScheduler {
        self.world
            .get_resource::<FrameScheduler>()
            .cloned()
            .unwrap_or_default()
    }

    pub fn speed_mode(&self) -> SpeedMode {
        self.scheduler().mode()
    }

    pub fn set_speed(&mut self, mode: SpeedMode) {
        if let Some(mut scheduler) = self.world.get_resource_mut::<FrameScheduler>() {
            scheduler.set_mode(mode);
        }
    }

    /// Routes the interaction event log to a JSONL file.
    pub fn set_event_log(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        self.world.insert_resource(EventLogger::new(path)?);
        Ok(())
    }

    /// Runs one tick. A panic inside a system is caught and returned as
    /// `SimError::Panicked`; the world keeps whatever state it reached.
    pub fn step(&mut self) -> Result<(), SimError> {
        let tick = self.tick();
        if !self.world.contains_resource::<SimClock>() {
            return Err(SimError::Tick {
                tick,
                reason: "world has no clock".into(),
            });
        }
        let (world, schedule) = (&mut self.world, &mut self.schedule);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| schedule.run(world))) {
            // The executor's progress state is left mid-run by the unwind.
            self.schedule = build_tick_schedule();
            return Err(SimError::Panicked(panic_message(payload)));
        }
        flush_events(&mut self.world)?;

        let tick = self.tick();
        let performance = self.scheduler().performance();
        self.metrics.maybe_sample(&mut self.world, tick, performance);
        Ok(())
    }

    /// Runs one tick under the failure policy: errors are logged and
    /// followed by a cooldown, and only `max_consecutive_failures` failures
    /// in a row are fatal.
    pub fn step_resilient(&mut self) -> Result<(), SimError> {
        match self.step() {
            Ok(()) => {
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(err) => {
                self.consecutive_failures += 1;
                let limit = self.config.scheduler.max_consecutive_failures.max(1);
                tracing::error!(
                    tick = self.tick(),
                    failures = self.consecutive_failures,
                    error = %err,
                    "tick failed"
                );
                if self.consecutive_failures >= limit {
                    return Err(SimError::PersistentFailure {
                        failures: self.consecutive_failures,
                        last: err.to_string(),
                    });
                }
                std::thread::sleep(Duration::from_millis(self.config.scheduler.error_cooldown_ms));
                Ok(())
            }
        }
    }

    /// Runs one rendered frame: `steps_per_frame` ticks of the current
    /// speed mode. Returns the number of ticks executed.
    pub fn run_frame(&mut self) -> Result<u32, SimError> {
        let steps = self.scheduler().profile().steps_per_frame;
        let started = Instant::now();
        for _ in 0..steps {
            self.step_resilient()?;
        }
        let (auto, target) = (self.config.scheduler.auto_optimize, self.config.scheduler.target_fps);
        if let Some(mut scheduler) = self.world.get_resource_mut::<FrameScheduler>() {
            scheduler.record_frame(started.elapsed(), steps);
            if auto {
                scheduler.auto_optimize(target);
            }
        }
        Ok(steps)
    }

    /// Runs exactly `ticks` ticks.
    pub fn run(&mut self, ticks: u64) -> Result<(), SimError> {
        for _ in 0..ticks {
            self.step_resilient()?;
        }
        Ok(())
    }

    /// Render snapshot at the detail level of the current speed mode
    pub fn snapshot(&mut self) -> RenderSnapshot {
        let detail = self.scheduler().profile().render_detail;
        build_render_snapshot_with(&mut self.world, detail)
    }

    pub fn latest_metrics(&self) -> Option<&MetricsSample> {
        self.metrics.latest()
    }

    /// Replaces the world with a fresh one built from `config`.
    pub fn reset(&mut self, config: SimConfig) -> Result<(), SimError> {
        config.validate()?;
        let mode = self.speed_mode();
        *self = Self::from_world(init_world(&config), config);
        self.set_speed(mode);
        tracing::info!("simulation reset");
        Ok(())
    }

    pub fn save_checkpoint(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        save_checkpoint(&mut self.world, path.as_ref())?;
        Ok(())
    }

    /// Loads a checkpoint. The current world is replaced only if the whole
    /// checkpoint loads.
    pub fn load_checkpoint(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let mut world = load_checkpoint(path.as_ref())?;
        let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
        if let Some(logger) = self.world.remove_resource::<EventLogger>() {
            world.insert_resource(logger);
        }
        let mode = self.speed_mode();
        *self = Self::from_world(world, config);
        self.set_speed(mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Brain;
    use crate::components::{Agent, PopulationStats};
    use crate::output::metrics::ActionTally;
    use crate::store::ComponentStore;
    use crate::systems::living_count;
    use crate::SimRng;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.population.size = 10;
        config.population.farm_count = 4;
        config.population.workplace_count = 2;
        config.world.seed = 7;
        config
    }

    fn runs_in(scheduler: &mut FrameScheduler, ticks: u64, base: u64) -> usize {
        (0..ticks)
            .filter(|_| {
                let due = scheduler.is_due(base);
                scheduler.advance();
                due
            })
            .count()
    }

    #[test]
    fn test_is_due_follows_mode() {
        // ticks 0, 4 and 8
        assert_eq!(runs_in(&mut FrameScheduler::new(SpeedMode::Normal), 9, 4), 3);
        // interval ceil(4 / 0.7) = 6: ticks 0 and 6
        assert_eq!(runs_in(&mut FrameScheduler::new(SpeedMode::Fast), 12, 4), 2);
        assert_eq!(runs_in(&mut FrameScheduler::new(SpeedMode::Normal), 5, 1), 5);
    }

    #[test]
    fn test_auto_optimize_moves_toward_target() {
        let mut scheduler = FrameScheduler::new(SpeedMode::Normal);
        assert_eq!(scheduler.auto_optimize(30.0), None);

        // 100 ms frames = 10 fps, well under 0.8 * 30
        scheduler.record_frame(Duration::from_millis(100), 1);
        assert_eq!(scheduler.auto_optimize(30.0), Some(SpeedMode::Fast));
        assert_eq!(scheduler.profile().steps_per_frame, 3);

        // 10 ms frames = 100 fps, above 1.2 * 30
        scheduler.record_frame(Duration::from_millis(10), 3);
        assert_eq!(scheduler.auto_optimize(30.0), Some(SpeedMode::Normal));

        // within the band nothing changes
        scheduler.record_frame(Duration::from_millis(33), 1);
        assert_eq!(scheduler.auto_optimize(30.0), None);
    }

    #[test]
    fn test_performance_counters() {
        let mut scheduler = FrameScheduler::new(SpeedMode::Faster);
        scheduler.record_frame(Duration::from_millis(50), 5);
        scheduler.record_frame(Duration::from_millis(50), 5);
        let perf = scheduler.performance();
        assert_eq!(perf.speed_mode, "faster");
        assert_eq!(perf.steps_per_frame, 5);
        assert!((perf.avg_frame_ms - 50.0).abs() < 1e-3);
        assert!((perf.iterations_per_second - 100.0).abs() < 1e-2);
        // Faster renders every fifth frame
        assert!(!scheduler.should_render());
    }

    #[test]
    fn test_step_advances_clock_and_samples_metrics() {
        let mut sim = Simulation::new(small_config()).unwrap();
        sim.run(25).unwrap();
        assert_eq!(sim.tick(), 25);
        assert_eq!(sim.scheduler().ticks_run(), 25);
        // samples at ticks 10 and 20
        assert_eq!(sim.metrics().len(), 2);
        assert_eq!(sim.latest_metrics().unwrap().tick, 20);
    }

    #[test]
    fn test_run_frame_uses_speed_mode() {
        let mut sim = Simulation::new(small_config()).unwrap();
        sim.set_speed(SpeedMode::Faster);
        assert_eq!(sim.run_frame().unwrap(), 5);
        assert_eq!(sim.tick(), 5);
        assert_eq!(sim.scheduler().frames(), 1);
    }

    #[test]
    fn test_missing_clock_is_a_tick_error() {
        let mut sim = Simulation::new(small_config()).unwrap();
        sim.world_mut().remove_resource::<SimClock>();
        assert!(matches!(sim.step(), Err(SimError::Tick { .. })));
    }

    #[test]
    fn test_persistent_failure_is_fatal() {
        let mut config = small_config();
        config.scheduler.max_consecutive_failures = 3;
        config.scheduler.error_cooldown_ms = 0;
        let mut sim = Simulation::new(config).unwrap();
        sim.world_mut().remove_resource::<SimClock>();
        assert!(sim.step_resilient().is_ok());
        assert!(sim.step_resilient().is_ok());
        assert!(matches!(
            sim.step_resilient(),
            Err(SimError::PersistentFailure { failures: 3, .. })
        ));
    }

    fn with_broken_network(brain: &mut Brain) {
        let mut value = serde_json::to_value(&brain.network).unwrap();
        value["weights_ih"] = serde_json::json!([]);
        brain.network = serde_json::from_value(value).unwrap();
    }

    #[test]
    fn test_tick_after_panic_runs_every_system() {
        let mut config = small_config();
        // always consult the network so the broken brain is reached
        config.brain.base_exploration = 0.0;
        let brain_config = config.brain.clone();
        let mut sim = Simulation::new(config).unwrap();

        let agent = sim.world_mut().entities_with::<With<Agent>>()[0];
        let mut rng = SmallRng::seed_from_u64(1);
        let healthy = Brain::new(&brain_config, &mut rng);
        let mut broken = healthy.clone();
        with_broken_network(&mut broken);
        sim.world_mut().entity_mut(agent).insert(broken);

        assert!(matches!(sim.step(), Err(SimError::Panicked(_))));
        assert_eq!(sim.tick(), 0);
        assert!(sim.world().contains_resource::<SimRng>());

        sim.world_mut().entity_mut(agent).insert(healthy);
        sim.world_mut().resource_mut::<ActionTally>().take();
        sim.step().unwrap();
        assert_eq!(sim.tick(), 1);
        let living = living_count(sim.world_mut()) as u64;
        assert!(living > 0);
        assert_eq!(sim.world().resource::<ActionTally>().counts.total(), living);
    }

    #[test]
    fn test_reset_rebuilds_world() {
        let mut sim = Simulation::new(small_config()).unwrap();
        sim.set_speed(SpeedMode::Fast);
        sim.run(5).unwrap();
        sim.reset(small_config()).unwrap();
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.speed_mode(), SpeedMode::Fast);
        assert_eq!(sim.world().resource::<PopulationStats>().epoch, 0);
        assert!(sim.metrics().is_empty());
    }
}
