pub mod client;
pub mod worker;

pub use client::{HttpTaskSource, TaskSource};
pub use worker::{run_worker, AgentPool, WorkerStats};
