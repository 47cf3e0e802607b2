use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use calc_core::config::{DispatchConfig, OperationTimings};
use calc_core::{AgentTask, TaskResult};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::error::SchedulerError;
use crate::graph::{NodeKind, TaskId, TaskStatus};
use crate::parser::parse;

use super::metrics::{MetricsSnapshot, SchedulerMetrics};
use super::registry::{Expression, ExpressionId, ExpressionRegistry, TaskHandle};

/// Outcome of an accepted completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub expression_id: ExpressionId,
    /// `true` if this completion finalized the expression.
    pub expression_completed: bool,
}

/// Owns the ready-task queue and drives tasks from submission to completion.
///
/// One instance per server process, shared behind an `Arc`. A task enters the
/// queue only after it has been claimed (its `queued` flag set under its own
/// lock while every operand is observed completed), so no task is ever queued
/// twice and every task that becomes ready is queued by whichever completion
/// observes it ready last.
///
/// Capacity is enforced at admission: `submit` takes one permit per operator
/// task (at most `capacity` per expression) and each completion hands permits
/// back. Queued tasks always hold a permit, so the queue itself never needs to
/// refuse a push and `complete` / `reap_expired` never wait.
pub struct Dispatcher {
    registry: ExpressionRegistry,
    sender: mpsc::UnboundedSender<TaskHandle>,
    receiver: Mutex<mpsc::UnboundedReceiver<TaskHandle>>,
    admission: Semaphore,
    capacity: usize,
    depth: AtomicUsize,
    /// Tasks handed to an agent and not yet completed.
    in_flight: Mutex<HashMap<TaskId, TaskHandle>>,
    timings: OperationTimings,
    metrics: SchedulerMetrics,
}

impl Dispatcher {
    /// Create a dispatcher that admits at most `capacity` unfinished operator
    /// tasks at a time.
    pub fn new(capacity: usize, timings: OperationTimings) -> Self {
        let capacity = capacity.clamp(1, u32::MAX as usize);
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            registry: ExpressionRegistry::new(),
            sender,
            receiver: Mutex::new(receiver),
            admission: Semaphore::new(capacity),
            capacity,
            depth: AtomicUsize::new(0),
            in_flight: Mutex::new(HashMap::new()),
            timings,
            metrics: SchedulerMetrics::default(),
        }
    }

    pub fn from_config(dispatch: &DispatchConfig, timings: OperationTimings) -> Self {
        Self::new(dispatch.queue_capacity, timings)
    }

    pub fn registry(&self) -> &ExpressionRegistry {
        &self.registry
    }

    /// Parse and register an expression, then queue every task that is ready.
    ///
    /// Waits until enough permits are free; that is the backpressure applied
    /// to submitters when agents fall behind. An expression with more operator
    /// tasks than the capacity waits for the whole capacity and then runs
    /// alone. Nothing is registered before the wait ends, so dropping the
    /// future leaves no trace.
    pub async fn submit(&self, source: &str) -> Result<ExpressionId, SchedulerError> {
        let graph = parse(source)?;
        let permits = graph.operator_count().min(self.capacity);
        if permits > 0 {
            let count = u32::try_from(permits).unwrap_or(u32::MAX);
            self.admission
                .acquire_many(count)
                .await
                .map_err(|_| SchedulerError::QueueClosed)?
                .forget();
        }

        let expression = Arc::new(Expression::new(source, graph));
        expression.hold_permits(permits);
        let id = expression.id.clone();

        self.registry.insert(Arc::clone(&expression));
        self.metrics.expression_submitted();
        info!(expression_id = %id, tasks = expression.graph.len(), "expression submitted");

        if expression.finalize() {
            self.metrics.expression_completed();
            info!(expression_id = %id, result = ?expression.result(), "expression completed");
            return Ok(id);
        }

        let graph = &expression.graph;
        for index in graph.collect(graph.root()) {
            let handle = TaskHandle::new(&expression, index);
            if claim(&handle) {
                self.enqueue(handle)?;
            }
        }
        Ok(id)
    }

    /// Pop the next ready task and mark it `processing`. Never blocks.
    pub fn pull(&self) -> Option<AgentTask> {
        loop {
            let handle = {
                let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
                receiver.try_recv().ok()?
            };
            self.depth.fetch_sub(1, Ordering::AcqRel);
            if let Some(task) = self.start_dispatch(&handle) {
                self.in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(task.id.clone(), handle);
                return Some(task);
            }
        }
    }

    /// Accept an agent's result for a dispatched task and propagate it.
    /// Never waits, so a caller that goes away cannot leave a claimed
    /// dependent unqueued.
    pub fn complete(&self, result: TaskResult) -> Result<Completion, SchedulerError> {
        let Some(handle) = self.registry.task(&result.id) else {
            self.metrics.completion_rejected();
            return Err(SchedulerError::TaskNotFound(result.id));
        };

        if let Err(e) = self.accept(&handle, &result) {
            self.metrics.completion_rejected();
            warn!(task_id = %result.id, error = %e, "completion rejected");
            return Err(e);
        }
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&result.id);
        self.metrics.task_completed();
        debug!(task_id = %result.id, result = result.result, "task completed");

        let expression = &handle.expression;
        for &dependent in handle.node().depended_by() {
            let dependent = TaskHandle::new(expression, dependent);
            if claim(&dependent) {
                self.enqueue(dependent)?;
            }
        }
        if expression.settle_task() {
            self.admission.add_permits(1);
        }

        let expression_completed = expression.finalize();
        if expression_completed {
            self.metrics.expression_completed();
            info!(expression_id = %expression.id, result = ?expression.result(), "expression completed");
        }

        Ok(Completion {
            expression_id: expression.id.clone(),
            expression_completed,
        })
    }

    /// Return tasks that have been `processing` for at least `timeout` to the
    /// queue. Their generation is bumped so the late result of the abandoned
    /// dispatch is rejected. Returns how many tasks were re-queued.
    pub fn reap_expired(&self, timeout: Duration) -> Result<usize, SchedulerError> {
        let candidates: Vec<TaskHandle> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let now = Instant::now();
        let mut requeued = 0;
        for handle in candidates {
            let reclaimed = {
                let mut state = handle.node().lock();
                let expired = state
                    .dispatched_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= timeout);
                if state.status == TaskStatus::Processing && expired {
                    state.status = TaskStatus::Pending;
                    state.queued = true;
                    state.generation += 1;
                    state.dispatched_at = None;
                    true
                } else {
                    false
                }
            };
            if !reclaimed {
                continue;
            }
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(handle.task_id());
            warn!(task_id = %handle.task_id(), expression_id = %handle.expression.id, "task timed out, re-queueing");
            self.metrics.task_requeued();
            self.enqueue(handle)?;
            requeued += 1;
        }
        Ok(requeued)
    }

    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.queue_depth(),
            queue_capacity: self.capacity,
            permits_available: self.admission.available_permits(),
            in_flight: self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len(),
            ..self.metrics.snapshot()
        }
    }

    fn enqueue(&self, handle: TaskHandle) -> Result<(), SchedulerError> {
        debug!(task_id = %handle.task_id(), "task queued");
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.sender.send(handle).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            SchedulerError::QueueClosed
        })
    }

    /// Transition a popped task to `processing` and build its wire form.
    /// `None` if the entry no longer refers to a queued task.
    fn start_dispatch(&self, handle: &TaskHandle) -> Option<AgentTask> {
        let graph = &handle.expression.graph;
        let node = handle.node();
        let NodeKind::Binary { op, arg1, arg2 } = node.kind else {
            return None;
        };

        let mut state = node.lock();
        if state.status != TaskStatus::Pending || !state.queued {
            return None;
        }
        let (Some(lhs), Some(rhs)) = (graph.operand_value(arg1), graph.operand_value(arg2)) else {
            warn!(task_id = %node.id, "queued task has unresolved operands, dropping");
            state.queued = false;
            return None;
        };

        state.status = TaskStatus::Processing;
        state.queued = false;
        state.generation += 1;
        state.dispatched_at = Some(Instant::now());
        self.metrics.task_dispatched();
        debug!(task_id = %node.id, generation = state.generation, "task dispatched");

        Some(AgentTask {
            id: node.id.clone(),
            operation: op,
            arg1: lhs,
            arg2: rhs,
            operation_time: self.timings.for_operation(op),
            generation: state.generation,
        })
    }

    /// Record the result under the task's lock.
    fn accept(&self, handle: &TaskHandle, result: &TaskResult) -> Result<(), SchedulerError> {
        let mut state = handle.node().lock();
        if state.status == TaskStatus::Completed {
            return Err(SchedulerError::AlreadyCompleted(result.id.clone()));
        }
        if let Some(got) = result.generation {
            if got != state.generation {
                return Err(SchedulerError::StaleCompletion {
                    task_id: result.id.clone(),
                    expected: state.generation,
                    got,
                });
            }
        }
        if state.status != TaskStatus::Processing {
            return Err(SchedulerError::NotDispatched(result.id.clone()));
        }
        state.status = TaskStatus::Completed;
        state.result = Some(result.result);
        state.dispatched_at = None;
        Ok(())
    }
}

/// Mark a pending, ready, not-yet-queued task as queued. Holds the task's lock
/// while checking its operands, so two racing completions cannot both claim it.
fn claim(handle: &TaskHandle) -> bool {
    let node = handle.node();
    let mut state = node.lock();
    if state.status != TaskStatus::Pending || state.queued {
        return false;
    }
    if !handle.expression.graph.is_ready(handle.index) {
        return false;
    }
    state.queued = true;
    true
}
