use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::error::{Error, Result};

struct Running {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    interval: Duration,
}

/// Recurring timer that owns its own cancellation. Each tick spawns the
/// callback as a separate local task, so a slow cycle never delays the next
/// tick and cycles may overlap. Must be used inside a `LocalSet`.
#[derive(Default)]
pub struct Scheduler {
    running: Option<Running>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking every `interval`, first tick one interval from now.
    /// Replaces any timer already running.
    pub fn start<F, Fut>(&mut self, interval: Duration, tick: F) -> Result<()>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        if interval.is_zero() {
            return Err(Error::msg("refresh interval must be greater than zero"));
        }
        self.stop();

        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::task::spawn_local(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        debug!("refresh timer fired");
                        tokio::task::spawn_local(tick());
                    }
                }
            }
        });
        info!(interval_ms = interval.as_millis() as u64, "auto-refresh timer started");
        self.running = Some(Running {
            stop,
            handle,
            interval,
        });
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            // The receiver is gone only if the task already ended.
            let _ = running.stop.send(());
            drop(running.handle);
            info!("auto-refresh timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|r| r.interval)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
