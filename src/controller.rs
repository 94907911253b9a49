use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::sampler::{
    CancelToken, DrawSink, EstimateSink, Outcome, RunSnapshot, RunStats, SamplingWorker,
};
use crate::settings::{Color, Settings};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Cannot start a new run from the sampling thread")]
    Reentrant,
}

/// Text for the pause toggle button after a flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseLabel {
    Pause,
    Continue,
}

impl PauseLabel {
    pub fn for_active(active: bool) -> Self {
        if active {
            PauseLabel::Pause
        } else {
            PauseLabel::Continue
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PauseLabel::Pause => "Pause",
            PauseLabel::Continue => "Continue",
        }
    }
}

pub struct RunConfig {
    pub radius: u32,
    pub budget: u32,
    /// Fixed RNG seed for reproducible runs, fresh entropy when `None`.
    pub seed: Option<u64>,
}

struct WorkerHandle {
    run_id: u64,
    thread: ThreadId,
    cancel: CancelToken,
}

struct Slot {
    worker: Option<WorkerHandle>,
    stats: Arc<RunStats>,
    next_run: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    exited: Condvar,
}

impl Shared {
    /// Called by the worker thread once its loop is over.
    fn worker_exited(&self, run_id: u64) {
        let mut slot = self.slot.lock();
        if slot.worker.as_ref().is_some_and(|w| w.run_id == run_id) {
            slot.worker = None;
        }
        self.exited.notify_all();
    }
}

/// Releases the worker slot when the sampling thread ends, even by panic.
struct ExitGuard {
    shared: Arc<Shared>,
    run_id: u64,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Run {} aborted by a panic", self.run_id);
        }
        self.shared.worker_exited(self.run_id);
    }
}

/// Owns the single sampling thread and the settings it reads.
pub struct RunController {
    config: RunConfig,
    settings: Arc<Settings>,
    shared: Arc<Shared>,
    draw: Arc<dyn DrawSink>,
    estimates: Arc<dyn EstimateSink>,
}

impl RunController {
    pub fn new(
        config: RunConfig,
        draw: Arc<dyn DrawSink>,
        estimates: Arc<dyn EstimateSink>,
    ) -> Self {
        Self {
            config,
            settings: Arc::new(Settings::default()),
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    worker: None,
                    stats: Arc::new(RunStats::default()),
                    next_run: 0,
                }),
                exited: Condvar::new(),
            }),
            draw,
            estimates,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tears down any previous run, then starts a fresh one.
    pub fn start(&self) -> Result<(), ControllerError> {
        let mut slot = self.shared.slot.lock();
        if slot
            .worker
            .as_ref()
            .is_some_and(|w| w.thread == thread::current().id())
        {
            log::error!("start() called from the sampling thread");
            return Err(ControllerError::Reentrant);
        }
        self.finish_locked(&mut slot);

        let run_id = slot.next_run;
        slot.next_run += 1;
        let stats = Arc::new(RunStats::default());
        let cancel = CancelToken::new();
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let worker = SamplingWorker {
            radius: self.config.radius,
            budget: self.config.budget,
            settings: self.settings.clone(),
            stats: stats.clone(),
            cancel: cancel.clone(),
            rng,
            draw: self.draw.clone(),
            estimates: self.estimates.clone(),
        };
        let shared = self.shared.clone();

        // Spawned while the slot is held, so the exit notification can't overtake the handle.
        let spawned = thread::Builder::new()
            .name(format!("pi-sampler-{run_id}"))
            .spawn(move || {
                let _guard = ExitGuard { shared, run_id };
                match worker.run() {
                    Outcome::Completed => log::info!("Run {run_id} completed"),
                    Outcome::Canceled => log::info!("Run {run_id} canceled"),
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Could not start run {run_id}: {e}");
                return Err(e.into());
            }
        };

        log::info!(
            "Run {run_id} started: radius {}, budget {}",
            self.config.radius,
            self.config.budget
        );
        slot.stats = stats;
        slot.worker = Some(WorkerHandle {
            run_id,
            thread: handle.thread().id(),
            cancel,
        });
        Ok(())
    }

    /// Cancels the current run and blocks until its thread has exited.
    pub fn finish(&self) {
        let mut slot = self.shared.slot.lock();
        self.finish_locked(&mut slot);
    }

    fn finish_locked(&self, slot: &mut MutexGuard<'_, Slot>) {
        let Some(worker) = &slot.worker else { return };
        worker.cancel.cancel();
        if worker.thread == thread::current().id() {
            // Waiting here would wait on ourselves.
            log::warn!("finish() called from the sampling thread, not waiting");
            return;
        }
        while slot.worker.is_some() {
            self.shared.exited.wait(slot);
        }
    }

    /// Cancels the current run without waiting for it.
    pub fn stop(&self) {
        if let Some(worker) = &self.shared.slot.lock().worker {
            worker.cancel.cancel();
        }
    }

    /// Blocks until the current run ends on its own.
    pub fn wait_idle(&self) {
        let mut slot = self.shared.slot.lock();
        while slot.worker.is_some() {
            self.shared.exited.wait(&mut slot);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.slot.lock().worker.is_some()
    }

    /// Counters of the current (or last) run.
    pub fn stats(&self) -> RunSnapshot {
        self.shared.slot.lock().stats.snapshot()
    }

    pub fn is_paused(&self) -> bool {
        !self.settings.is_active()
    }

    pub fn toggle_pause(&self) -> PauseLabel {
        let active = self.settings.toggle_active();
        log::debug!("{}", if active { "Resumed" } else { "Paused" });
        PauseLabel::for_active(active)
    }

    pub fn resume(&self) -> PauseLabel {
        self.settings.set_active(true);
        PauseLabel::Pause
    }

    pub fn set_speed(&self, delay_ms: u64) {
        self.settings.set_delay_ms(delay_ms);
    }

    pub fn set_arc_color(&self, color: Color) {
        self.settings.set_arc_color(color);
    }

    pub fn set_point_color(&self, color: Color) {
        self.settings.set_point_color(color);
    }

    pub fn set_background_color(&self, color: Color) {
        self.settings.set_background_color(color);
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.finish();
    }
}
