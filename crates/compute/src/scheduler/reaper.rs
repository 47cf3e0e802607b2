//! Background re-queueing of tasks whose agent went silent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::dispatcher::Dispatcher;

/// Spawn a loop that calls [`Dispatcher::reap_expired`] every `interval`
/// until `shutdown` is notified.
pub fn spawn_reaper(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    timeout: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, ?timeout, "task reaper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = ticker.tick() => {
                    match dispatcher.reap_expired(timeout) {
                        Ok(0) => {}
                        Ok(n) => info!(requeued = n, "reaper re-queued expired tasks"),
                        Err(e) => {
                            error!(error = %e, "reaper stopped");
                            break;
                        }
                    }
                }
            }
        }
        info!("task reaper stopped");
    })
}
