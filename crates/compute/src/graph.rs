//! Task DAG for a single expression.
//!
//! Nodes live in an arena owned by [`TaskGraph`]; edges are arena indices, so
//! the `depends_on` / `depended_by` links never form ownership cycles. The
//! shape of a node is fixed once the graph is built. Only its [`TaskState`]
//! changes, behind a per-node mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use calc_core::Operation;
use serde::{Deserialize, Serialize};

/// Position of a node inside its graph's arena.
pub type NodeIndex = usize;

/// Globally unique task identifier (UUID v4 string).
pub type TaskId = String;

/// One argument of a binary operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Literal(f64),
    Task(NodeIndex),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// A numeric literal. Created already completed.
    Number(f64),
    Binary {
        op: Operation,
        arg1: Operand,
        arg2: Operand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
}

/// Mutable part of a task.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub status: TaskStatus,
    /// Valid only once `status == Completed`.
    pub result: Option<f64>,
    /// Set while the task sits in the dispatch queue.
    pub queued: bool,
    /// Bumped on every dispatch and every reap.
    pub generation: u64,
    pub dispatched_at: Option<Instant>,
}

impl TaskState {
    fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            result: None,
            queued: false,
            generation: 0,
            dispatched_at: None,
        }
    }

    fn completed(value: f64) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(value),
            queued: false,
            generation: 0,
            dispatched_at: None,
        }
    }
}

#[derive(Debug)]
pub struct TaskNode {
    pub id: TaskId,
    pub kind: NodeKind,
    depends_on: Vec<NodeIndex>,
    depended_by: Vec<NodeIndex>,
    state: Mutex<TaskState>,
}

impl TaskNode {
    fn new(kind: NodeKind) -> Self {
        let state = match kind {
            NodeKind::Number(value) => TaskState::completed(value),
            NodeKind::Binary { .. } => TaskState::pending(),
        };
        let depends_on = match kind {
            NodeKind::Number(_) => Vec::new(),
            NodeKind::Binary { arg1, arg2, .. } => [arg1, arg2]
                .into_iter()
                .filter_map(|arg| match arg {
                    Operand::Task(idx) => Some(idx),
                    Operand::Literal(_) => None,
                })
                .collect(),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            depends_on,
            depended_by: Vec::new(),
            state: Mutex::new(state),
        }
    }

    /// `None` for numeric literals.
    pub fn operation(&self) -> Option<Operation> {
        match self.kind {
            NodeKind::Number(_) => None,
            NodeKind::Binary { op, .. } => Some(op),
        }
    }

    pub fn depends_on(&self) -> &[NodeIndex] {
        &self.depends_on
    }

    pub fn depended_by(&self) -> &[NodeIndex] {
        &self.depended_by
    }

    /// Lock this task's state. Lock order is parent before operand.
    pub fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    pub fn result(&self) -> Option<f64> {
        let state = self.lock();
        match state.status {
            TaskStatus::Completed => state.result,
            _ => None,
        }
    }
}

/// Incrementally assembles a [`TaskGraph`], wiring both edge directions.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<TaskNode>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(&mut self, value: f64) -> NodeIndex {
        self.push(NodeKind::Number(value))
    }

    pub fn binary(&mut self, op: Operation, arg1: Operand, arg2: Operand) -> NodeIndex {
        let idx = self.push(NodeKind::Binary { op, arg1, arg2 });
        let deps = self.nodes[idx].depends_on.clone();
        for dep in deps {
            self.nodes[dep].depended_by.push(idx);
        }
        idx
    }

    pub fn finish(self, root: NodeIndex) -> TaskGraph {
        TaskGraph {
            nodes: self.nodes,
            root,
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeIndex {
        self.nodes.push(TaskNode::new(kind));
        self.nodes.len() - 1
    }
}

#[derive(Debug)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    root: NodeIndex,
}

impl TaskGraph {
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_node(&self) -> &TaskNode {
        &self.nodes[self.root]
    }

    pub fn node(&self, idx: NodeIndex) -> &TaskNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of binary nodes, i.e. tasks an agent has to compute.
    pub fn operator_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.operation().is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &TaskNode)> {
        self.nodes.iter().enumerate()
    }

    /// Value of an operand, if it is resolved.
    pub fn operand_value(&self, operand: Operand) -> Option<f64> {
        match operand {
            Operand::Literal(value) => Some(value),
            Operand::Task(idx) => self.nodes[idx].result(),
        }
    }

    /// A number is always ready; a binary task is ready once every task
    /// operand has completed. Locks only the operand nodes.
    pub fn is_ready(&self, idx: NodeIndex) -> bool {
        match self.nodes[idx].kind {
            NodeKind::Number(_) => true,
            NodeKind::Binary { arg1, arg2, .. } => {
                self.operand_ready(arg1) && self.operand_ready(arg2)
            }
        }
    }

    fn operand_ready(&self, operand: Operand) -> bool {
        match operand {
            Operand::Literal(_) => true,
            Operand::Task(idx) => self.nodes[idx].status() == TaskStatus::Completed,
        }
    }

    /// Depth-first walk from `start`: node first, then `arg1`'s subtree, then
    /// `arg2`'s. Every reachable node appears exactly once.
    pub fn collect(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![start];

        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            order.push(idx);
            if let NodeKind::Binary { arg1, arg2, .. } = self.nodes[idx].kind {
                for arg in [arg2, arg1] {
                    if let Operand::Task(child) = arg {
                        stack.push(child);
                    }
                }
            }
        }
        order
    }
}
