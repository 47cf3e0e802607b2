//! Ready-queue scheduler for expression task graphs.
//!
//! Submitting an expression registers it and queues its immediately ready
//! tasks. Agents pull tasks one at a time and post results back; every
//! accepted result re-checks only the completed task's dependents, and the
//! completion of the root finalizes the expression.

pub mod dispatcher;
pub mod metrics;
pub mod reaper;
pub mod registry;

pub use dispatcher::{Completion, Dispatcher};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use reaper::spawn_reaper;
pub use registry::{
    Expression, ExpressionId, ExpressionRegistry, ExpressionStatus, ExpressionSummary, TaskHandle,
};
