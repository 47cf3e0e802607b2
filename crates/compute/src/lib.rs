pub mod error;
pub mod graph;
pub mod parser;
pub mod scheduler;

pub use error::{ParseError, SchedulerError};
pub use graph::{GraphBuilder, NodeIndex, NodeKind, Operand, TaskGraph, TaskId, TaskNode, TaskStatus};
pub use parser::parse;
pub use scheduler::{
    spawn_reaper, Completion, Dispatcher, Expression, ExpressionId, ExpressionRegistry,
    ExpressionStatus, ExpressionSummary, MetricsSnapshot, SchedulerMetrics, TaskHandle,
};
