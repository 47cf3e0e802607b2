//! Polling workers and the pool that runs `computing_power` of them.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::TaskSource;

/// What a worker did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Results the source accepted.
    pub completed: u64,
    /// Results computed but refused or lost in transit.
    pub dropped: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.completed += other.completed;
        self.dropped += other.dropped;
    }
}

/// Fetch, simulate `operation_time`, compute, submit; sleep `poll_interval`
/// whenever no task is ready. Returns once `shutdown` flips to `true` or its
/// sender is dropped. A task in hand at shutdown is abandoned.
pub async fn run_worker(
    worker: usize,
    source: Arc<dyn TaskSource>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    info!(worker, "worker started");

    while !*shutdown.borrow() {
        let task = match source.fetch().await {
            Ok(task) => task,
            Err(e) => {
                warn!(worker, error = %e, "fetch failed");
                None
            }
        };

        let Some(task) = task else {
            if interrupted(&mut shutdown, poll_interval).await {
                break;
            }
            continue;
        };

        debug!(worker, task_id = %task.id, operation = %task.operation, "computing");
        if interrupted(&mut shutdown, Duration::from_millis(task.operation_time)).await {
            warn!(worker, task_id = %task.id, "shutdown while computing, task abandoned");
            break;
        }

        let result = task.result(task.evaluate());
        match source.submit(result).await {
            Ok(()) => stats.completed += 1,
            Err(e) => {
                warn!(worker, task_id = %task.id, error = %e, "result dropped");
                stats.dropped += 1;
            }
        }
    }

    info!(worker, completed = stats.completed, dropped = stats.dropped, "worker stopped");
    stats
}

/// Sleep for `wait`; `true` if the shutdown signal fired (or its sender
/// went away) first.
async fn interrupted(shutdown: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        _ = shutdown.changed() => true,
    }
}

/// A fixed set of workers sharing one task source.
pub struct AgentPool {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<WorkerStats>>,
}

impl AgentPool {
    /// Spawn `computing_power` workers (at least one).
    pub fn spawn(source: Arc<dyn TaskSource>, computing_power: usize, poll_interval: Duration) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let workers = (0..computing_power.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&source),
                    poll_interval,
                    signal.clone(),
                ))
            })
            .collect();
        Self { shutdown, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Ask every worker to stop after its current step.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for every worker and sum their stats.
    pub async fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for handle in self.workers {
            match handle.await {
                Ok(stats) => total += stats,
                Err(e) => warn!(error = %e, "worker task failed"),
            }
        }
        total
    }
}
