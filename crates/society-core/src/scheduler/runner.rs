//! Threaded Runner
//!
//! Moves a `Simulation` onto its own thread. The loop reads `SimCommand`s
//! only between ticks and publishes snapshots and metrics through a shared
//! `SimStatus` that readers may observe slightly out of date.

use society_events::{MetricsSample, RenderSnapshot};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{Simulation, SpeedMode};
use crate::config::SimConfig;
use crate::error::SimError;

/// How often `wait_until` polls the shared status
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Messages consumed by the simulation thread at tick boundaries
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Start,
    Pause,
    Resume,
    /// Advance exactly this many ticks, also while paused
    Step(u64),
    SetSpeed(SpeedMode),
    /// Rebuild the world from the current configuration
    Reset,
    SaveCheckpoint(PathBuf),
    LoadCheckpoint(PathBuf),
    Stop,
}

/// What the simulation thread last published
#[derive(Debug, Clone, Default)]
pub struct SimStatus {
    pub tick: u64,
    pub running: bool,
    pub paused: bool,
    pub speed: SpeedMode,
    pub snapshot: RenderSnapshot,
    pub metrics: Option<MetricsSample>,
    pub last_error: Option<String>,
    /// Set once the loop has exited
    pub stopped: bool,
}

/// Owner-side handle to a simulation running on its own thread
pub struct SimulationHandle {
    commands: Sender<SimCommand>,
    status: Arc<RwLock<SimStatus>>,
    thread: Option<JoinHandle<Result<(), SimError>>>,
}

impl SimulationHandle {
    /// Builds the world from `config` and starts the loop thread. The loop
    /// idles until it receives `Start` or `Step`.
    pub fn spawn(config: SimConfig) -> Result<Self, SimError> {
        Self::spawn_with(Simulation::new(config)?)
    }

    pub fn spawn_with(mut sim: Simulation) -> Result<Self, SimError> {
        let (commands, inbox) = mpsc::channel();
        let status = Arc::new(RwLock::new(SimStatus::default()));
        publish(&mut sim, &status, false, false, true);

        let shared = Arc::clone(&status);
        let thread = thread::Builder::new()
            .name("society-sim".into())
            .spawn(move || run_loop(sim, inbox, shared))
            .map_err(SimError::Spawn)?;
        Ok(Self {
            commands,
            status,
            thread: Some(thread),
        })
    }

    pub fn send(&self, command: SimCommand) -> Result<(), SimError> {
        self.commands.send(command).map_err(|_| SimError::Disconnected)
    }

    pub fn status(&self) -> SimStatus {
        match self.status.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.status().snapshot
    }

    pub fn latest_metrics(&self) -> Option<MetricsSample> {
        self.status().metrics
    }

    /// Polls the published status until `done` holds or `timeout` passes.
    pub fn wait_until(&self, timeout: Duration, done: impl Fn(&SimStatus) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&self.status()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stops the loop after its current tick and waits for the thread.
    pub fn stop(mut self) -> Result<(), SimError> {
        // The loop may already be gone after a fatal error
        let _ = self.commands.send(SimCommand::Stop);
        self.join()
    }

    fn join(&mut self) -> Result<(), SimError> {
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SimError::Panicked("simulation thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.commands.send(SimCommand::Stop);
            if let Err(err) = self.join() {
                tracing::warn!(error = %err, "simulation thread ended with an error");
            }
        }
    }
}

fn publish(sim: &mut Simulation, status: &RwLock<SimStatus>, running: bool, paused: bool, render: bool) {
    let snapshot = render.then(|| sim.snapshot());
    let mut shared = match status.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    shared.tick = sim.tick();
    shared.running = running;
    shared.paused = paused;
    shared.speed = sim.speed_mode();
    shared.metrics = sim.latest_metrics().cloned();
    if let Some(snapshot) = snapshot {
        shared.snapshot = snapshot;
    }
}

fn report_error(status: &RwLock<SimStatus>, err: &SimError) {
    if let Ok(mut shared) = status.write() {
        shared.last_error = Some(err.to_string());
    }
}

/// Loop state carried between iterations
struct LoopState {
    running: bool,
    paused: bool,
    pending_steps: u64,
}

impl LoopState {
    fn idle(&self) -> bool {
        self.pending_steps == 0 && (!self.running || self.paused)
    }
}

/// Applies one command. Returns false when the loop should exit.
fn handle_command(sim: &mut Simulation, state: &mut LoopState, status: &RwLock<SimStatus>, command: SimCommand) -> bool {
    tracing::debug!(?command, tick = sim.tick(), "command received");
    match command {
        SimCommand::Start => {
            state.running = true;
            state.paused = false;
        }
        SimCommand::Pause => state.paused = true,
        SimCommand::Resume => state.paused = false,
        SimCommand::Step(n) => state.pending_steps += n,
        SimCommand::SetSpeed(mode) => sim.set_speed(mode),
        SimCommand::Reset => {
            let config = sim.config().clone();
            if let Err(err) = sim.reset(config) {
                tracing::warn!(error = %err, "reset failed");
                report_error(status, &err);
            }
            state.pending_steps = 0;
        }
        SimCommand::SaveCheckpoint(path) => match sim.save_checkpoint(&path) {
            Ok(()) => tracing::info!(path = %path.display(), tick = sim.tick(), "checkpoint saved"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "checkpoint save failed");
                report_error(status, &err);
            }
        },
        SimCommand::LoadCheckpoint(path) => match sim.load_checkpoint(&path) {
            Ok(()) => tracing::info!(path = %path.display(), tick = sim.tick(), "checkpoint loaded"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "checkpoint load failed");
                report_error(status, &err);
            }
        },
        SimCommand::Stop => return false,
    }
    true
}

fn run_loop(mut sim: Simulation, inbox: Receiver<SimCommand>, status: Arc<RwLock<SimStatus>>) -> Result<(), SimError> {
    let mut state = LoopState {
        running: false,
        paused: false,
        pending_steps: 0,
    };
    tracing::info!(tick = sim.tick(), "simulation thread started");

    let result = loop {
        // Block while there is nothing to run; otherwise drain without waiting.
        let mut keep_going = true;
        if state.idle() {
            match inbox.recv() {
                Ok(command) => keep_going = handle_command(&mut sim, &mut state, &status, command),
                Err(_) => break Ok(()),
            }
        }
        while keep_going {
            match inbox.try_recv() {
                Ok(command) => keep_going = handle_command(&mut sim, &mut state, &status, command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    keep_going = false;
                }
            }
        }
        if !keep_going {
            break Ok(());
        }

        let outcome = if state.pending_steps > 0 {
            state.pending_steps -= 1;
            sim.step_resilient().map(|()| true)
        } else if state.running && !state.paused {
            sim.run_frame().map(|_| sim.scheduler().should_render())
        } else {
            Ok(true)
        };
        match outcome {
            Ok(render) => publish(&mut sim, &status, state.running, state.paused, render),
            Err(err) => {
                tracing::error!(error = %err, "simulation loop stopped");
                report_error(&status, &err);
                break Err(err);
            }
        }
    };

    publish(&mut sim, &status, false, state.paused, true);
    if let Ok(mut shared) = status.write() {
        shared.stopped = true;
    }
    tracing::info!(tick = sim.tick(), "simulation thread stopped");
    result
}
