use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Scheduler counters, updated lock-free from request handlers.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    expressions_submitted: AtomicU64,
    expressions_completed: AtomicU64,
    tasks_dispatched: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_requeued: AtomicU64,
    completions_rejected: AtomicU64,
}

/// Point-in-time copy of [`SchedulerMetrics`] for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub expressions_submitted: u64,
    pub expressions_completed: u64,
    pub tasks_dispatched: u64,
    pub tasks_completed: u64,
    pub tasks_requeued: u64,
    pub completions_rejected: u64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    /// Admission permits not held by any expression.
    pub permits_available: usize,
    pub in_flight: usize,
}

impl SchedulerMetrics {
    pub fn expression_submitted(&self) {
        self.expressions_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn expression_completed(&self) {
        self.expressions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_requeued(&self) {
        self.tasks_requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completion_rejected(&self) {
        self.completions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; queue figures are filled in by the caller.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            expressions_submitted: self.expressions_submitted.load(Ordering::Relaxed),
            expressions_completed: self.expressions_completed.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_requeued: self.tasks_requeued.load(Ordering::Relaxed),
            completions_rejected: self.completions_rejected.load(Ordering::Relaxed),
            ..MetricsSnapshot::default()
        }
    }
}
