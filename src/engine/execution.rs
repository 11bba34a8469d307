// ABOUTME: Execution state and status aggregation
// ABOUTME: One Execution is a single run of a workflow definition

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::workflow::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    /// Reserved for conditional suspension; never produced by the base
    /// scheduling algorithm.
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Paused => write!(f, "paused"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub success_rate: f64,
}

/// One run of a workflow definition. Mutated only by the driver that owns
/// it (plus the documented cooperative cancellation path); readers get
/// cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub definition: String,
    pub status: ExecutionStatus,
    pub tasks: IndexMap<String, Task>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub metadata: HashMap<String, String>,
}

impl Execution {
    pub fn new(id: String, definition: String, tasks: IndexMap<String, Task>) -> Self {
        Self {
            id,
            definition,
            status: ExecutionStatus::Running,
            tasks,
            started_at: Utc::now(),
            finished_at: None,
            duration: None,
            metadata: HashMap::new(),
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(Task::is_terminal)
    }

    pub fn has_failed_tasks(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.status == TaskStatus::Failed)
    }

    fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status == status)
            .count()
    }

    pub fn summary(&self) -> ExecutionSummary {
        let total = self.tasks.len();
        let completed = self.count_status(TaskStatus::Completed);
        let failed = self.count_status(TaskStatus::Failed);
        let skipped = self.count_status(TaskStatus::Skipped);
        let success_rate = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        ExecutionSummary {
            total_tasks: total,
            completed_tasks: completed,
            failed_tasks: failed,
            skipped_tasks: skipped,
            success_rate,
        }
    }

    /// Final status from the per-task aggregate: Failed if any task Failed,
    /// else Completed. A no-op once the execution is already terminal, so an
    /// external cancellation is never overwritten.
    pub(crate) fn finalize(&mut self) {
        if !self.status.is_terminal() {
            self.status = if self.has_failed_tasks() {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Completed
            };
        }
        if self.finished_at.is_none() {
            self.stamp_finished();
        }
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.stamp_finished();
    }

    fn stamp_finished(&mut self) {
        let finished = Utc::now();
        self.finished_at = Some(finished);
        self.duration = Some(
            (finished - self.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
    }
}
