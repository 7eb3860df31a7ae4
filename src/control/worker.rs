//! The dedicated simulation thread.
//!
//! Ticks are paced by the handle's `speed` setting, re-read every iteration
//! so a speed command takes effect immediately. The lock is held for one
//! tick at most and never across the sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::control::SimulationHandle;

/// Owns the background tick thread. Dropping it signals shutdown; call
/// [`SimulationWorker::shutdown`] to also wait for the thread to exit.
pub struct SimulationWorker {
    thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl SimulationWorker {
    /// Starts ticking the simulation behind `handle`.
    pub fn spawn(handle: SimulationHandle) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let thread = thread::spawn(move || {
            info!("simulation worker started");
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }

                let pause_ms = {
                    let mut orchestrator = handle.inner.write();
                    if orchestrator.is_finished() {
                        break;
                    }
                    if orchestrator.is_running() {
                        orchestrator.run_step();
                    }
                    orchestrator.speed_ms()
                };

                thread::sleep(Duration::from_millis(pause_ms));
            }
            debug!("simulation worker stopped");
        });

        Self {
            thread: Some(thread),
            shutdown,
        }
    }

    /// Signals the thread to stop and waits for it to exit. Any snapshot in
    /// flight completes against the last committed tick.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SimulationWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
