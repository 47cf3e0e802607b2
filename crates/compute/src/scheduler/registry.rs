use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{NodeIndex, TaskGraph, TaskId, TaskNode, TaskStatus};

pub type ExpressionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionStatus {
    Pending,
    Completed,
}

#[derive(Debug)]
struct Outcome {
    status: ExpressionStatus,
    result: Option<f64>,
    completed_at: Option<DateTime<Utc>>,
}

/// Dispatch permits held on behalf of an expression.
#[derive(Debug)]
struct Admission {
    /// Operator tasks not yet completed.
    outstanding: usize,
    permits: usize,
}

/// One submitted expression. Owns its task graph for its whole lifetime.
#[derive(Debug)]
pub struct Expression {
    pub id: ExpressionId,
    pub source: String,
    pub graph: TaskGraph,
    pub created_at: DateTime<Utc>,
    outcome: Mutex<Outcome>,
    admission: Mutex<Admission>,
}

/// Read-only view served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionSummary {
    pub id: ExpressionId,
    pub expression: String,
    pub status: ExpressionStatus,
    #[serde(default, with = "calc_core::protocol::wire_float::option")]
    pub result: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Expression {
    pub fn new(source: impl Into<String>, graph: TaskGraph) -> Self {
        let outstanding = graph.operator_count();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            graph,
            created_at: Utc::now(),
            outcome: Mutex::new(Outcome {
                status: ExpressionStatus::Pending,
                result: None,
                completed_at: None,
            }),
            admission: Mutex::new(Admission {
                outstanding,
                permits: 0,
            }),
        }
    }

    fn admission(&self) -> MutexGuard<'_, Admission> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `permits` dispatch permits taken for this expression.
    pub fn hold_permits(&self, permits: usize) {
        self.admission().permits += permits;
    }

    pub fn held_permits(&self) -> usize {
        self.admission().permits
    }

    /// Account for one completed operator task. Returns `true` if the caller
    /// must hand a permit back: an expression never holds more permits than
    /// it has unfinished tasks.
    pub fn settle_task(&self) -> bool {
        let mut admission = self.admission();
        admission.outstanding = admission.outstanding.saturating_sub(1);
        if admission.permits > admission.outstanding {
            admission.permits -= 1;
            true
        } else {
            false
        }
    }

    fn outcome(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ExpressionStatus {
        self.outcome().status
    }

    pub fn result(&self) -> Option<f64> {
        self.outcome().result
    }

    /// Copy the root result into the expression once the root has completed.
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// concurrent completions of the root's operands finalize exactly once.
    pub fn finalize(&self) -> bool {
        let mut outcome = self.outcome();
        if outcome.status == ExpressionStatus::Completed {
            return false;
        }
        let root = self.graph.root_node().lock();
        if root.status != TaskStatus::Completed {
            return false;
        }
        outcome.status = ExpressionStatus::Completed;
        outcome.result = root.result;
        outcome.completed_at = Some(Utc::now());
        true
    }

    pub fn summary(&self) -> ExpressionSummary {
        let outcome = self.outcome();
        ExpressionSummary {
            id: self.id.clone(),
            expression: self.source.clone(),
            status: outcome.status,
            result: outcome.result,
            created_at: self.created_at,
            completed_at: outcome.completed_at,
        }
    }
}

/// A task together with the expression that owns it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub expression: Arc<Expression>,
    pub index: NodeIndex,
}

impl TaskHandle {
    pub fn new(expression: &Arc<Expression>, index: NodeIndex) -> Self {
        Self {
            expression: Arc::clone(expression),
            index,
        }
    }

    pub fn node(&self) -> &TaskNode {
        self.expression.graph.node(self.index)
    }

    pub fn task_id(&self) -> &TaskId {
        &self.node().id
    }
}

/// Process-wide store of expressions plus a task-id index over all of their
/// tasks. Entries are never evicted.
#[derive(Debug, Default)]
pub struct ExpressionRegistry {
    expressions: RwLock<HashMap<ExpressionId, Arc<Expression>>>,
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl ExpressionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expression and index every task in its graph.
    pub fn insert(&self, expression: Arc<Expression>) {
        {
            let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
            for (index, node) in expression.graph.iter() {
                tasks.insert(node.id.clone(), TaskHandle::new(&expression, index));
            }
        }
        self.expressions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(expression.id.clone(), expression);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Expression>> {
        self.expressions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn task(&self, id: &str) -> Option<TaskHandle> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Summaries of every expression, oldest first.
    pub fn list(&self) -> Vec<ExpressionSummary> {
        let mut summaries: Vec<ExpressionSummary> = self
            .expressions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|expr| expr.summary())
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.expressions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
