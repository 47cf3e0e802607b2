use thiserror::Error;

use crate::graph::TaskId;

/// Why an expression string could not be turned into a task graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task already completed: {0}")]
    AlreadyCompleted(TaskId),

    #[error("task was never dispatched: {0}")]
    NotDispatched(TaskId),

    #[error("stale completion for task {task_id}: generation {got}, current {expected}")]
    StaleCompletion { task_id: TaskId, expected: u64, got: u64 },

    #[error("dispatch queue closed")]
    QueueClosed,
}
