//! Fixed-interval reloads.

use super::{ReloadCallback, ReloadStrategy, invoke_safely};
use std::sync::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

const NAME: &str = "periodical";

/// Triggers a reload at a fixed rate on a dedicated thread.
///
/// The first reload fires one interval after `start`, not immediately.
///
/// A zero interval is refused: `start` logs an error and spawns nothing.
pub struct PeriodicalReloadStrategy {
    interval: Duration,
    timer: Mutex<Option<Timer>>,
}

/// Handle to the running timer thread. Dropping `stop_tx` wakes it up.
struct Timer {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicalReloadStrategy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn stop_timer(timer: Timer) {
        drop(timer.stop_tx);
        // A callback that stops its own strategy must not join itself.
        if timer.handle.thread().id() != thread::current().id() && timer.handle.join().is_err() {
            error!(strategy = NAME, "Reload timer thread terminated abnormally");
        }
    }
}

impl ReloadStrategy for PeriodicalReloadStrategy {
    fn start(&self, callback: ReloadCallback) {
        if self.interval.is_zero() {
            error!("Periodical reload interval must be positive; strategy not started");
            return;
        }
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting periodical reload strategy"
        );

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("config-reload-timer".to_string())
            .spawn(move || {
                let mut next_tick = Instant::now() + interval;
                loop {
                    let wait = next_tick.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            trace!("Triggering configuration reload");
                            invoke_safely(NAME, callback.as_ref());
                            next_tick += interval;
                        }
                        // Explicit stop or the sender was dropped.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to spawn reload timer thread");
                return;
            }
        };

        let previous = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(Timer { stop_tx, handle });
        if let Some(previous) = previous {
            Self::stop_timer(previous);
        }
        info!("Periodical reload strategy started");
    }

    fn stop(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(timer) = timer {
            info!("Stopping periodical reload strategy");
            Self::stop_timer(timer);
            info!("Periodical reload strategy stopped");
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

impl Drop for PeriodicalReloadStrategy {
    fn drop(&mut self) {
        self.stop();
    }
}
