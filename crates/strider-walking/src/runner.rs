//! Periodic control thread and the command surface shared with it.
//!
//! The supervisor lives behind one mutex. A control cycle holds it for the
//! whole cycle and every command holds it for the whole handler, so commands
//! and cycles never interleave.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strider_adapt::AdaptedStep;
use strider_core::error::TransitionError;
use strider_core::{CycleError, LocomotionPhase, StriderError};
use tracing::{debug, error, info, warn};

use crate::supervisor::{CycleStatus, Supervisor};

/// What the control loop does after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Halt,
}

/// Thread-safe access to a shared [`Supervisor`].
#[derive(Clone)]
pub struct CommandHandle {
    inner: Arc<Mutex<Supervisor>>,
}

impl CommandHandle {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(supervisor)),
        }
    }

    pub fn prepare(&self) -> Result<(), StriderError> {
        self.inner.lock().prepare()
    }

    pub fn start_walking(&self) -> Result<(), TransitionError> {
        self.inner.lock().start_walking()
    }

    pub fn pause_walking(&self) -> Result<(), TransitionError> {
        self.inner.lock().pause_walking()
    }

    pub fn stop_walking(&self) -> Result<(), StriderError> {
        self.inner.lock().stop_walking()
    }

    pub fn set_goal(&self, x: f64, y: f64) -> Result<(), StriderError> {
        self.inner.lock().set_goal(x, y)
    }

    pub fn phase(&self) -> LocomotionPhase {
        self.inner.lock().phase()
    }

    pub fn adapted_step(&self) -> Option<AdaptedStep> {
        self.inner.lock().adapted_step().copied()
    }

    pub fn run_cycle(&self) -> Result<CycleStatus, CycleError> {
        self.inner.lock().run_cycle()
    }

    /// Read the supervisor under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Supervisor) -> R) -> R {
        f(&self.inner.lock())
    }
}

/// Runs [`Supervisor::run_cycle`] on a dedicated thread at a fixed period.
pub struct ControlLoop {
    handle: CommandHandle,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl ControlLoop {
    /// Start the loop. `policy` sees every cycle outcome and decides whether
    /// the loop keeps going.
    pub fn spawn<P>(supervisor: Supervisor, period: Duration, policy: P) -> io::Result<Self>
    where
        P: FnMut(&Result<CycleStatus, CycleError>) -> LoopControl + Send + 'static,
    {
        Self::spawn_with_handle(CommandHandle::new(supervisor), period, policy)
    }

    /// Start the loop on an existing handle.
    pub fn spawn_with_handle<P>(handle: CommandHandle, period: Duration, mut policy: P) -> io::Result<Self>
    where
        P: FnMut(&Result<CycleStatus, CycleError>) -> LoopControl + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let cycles = Arc::new(AtomicU64::new(0));

        let thread_running = Arc::clone(&running);
        let thread_cycles = Arc::clone(&cycles);
        let thread_handle = handle.clone();
        let thread = thread::Builder::new()
            .name("strider-control".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while thread_running.load(Ordering::Acquire) {
                    let outcome = thread_handle.run_cycle();
                    thread_cycles.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = &outcome {
                        warn!(stage = %e.stage, error = %e.source, "control cycle failed");
                    }
                    if policy(&outcome) == LoopControl::Halt {
                        info!("control loop halted by policy");
                        thread_running.store(false, Ordering::Release);
                        break;
                    }

                    deadline += period;
                    let now = Instant::now();
                    match deadline.checked_duration_since(now) {
                        Some(wait) => thread::sleep(wait),
                        None => {
                            debug!(overrun = ?now.duration_since(deadline), "control cycle overran its period");
                            deadline = now;
                        }
                    }
                }
            })?;

        info!(period = ?period, "control loop started");
        Ok(Self {
            handle,
            running,
            cycles,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> CommandHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Wait until the policy halts the loop.
    pub fn join(mut self) {
        self.join_thread();
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => info!(cycles = self.cycles(), "control loop stopped"),
                Err(_) => error!("control thread panicked"),
            }
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if self.is_running() {
                warn!("control loop dropped while running, forcing stop");
            }
            self.stop();
        }
    }
}
