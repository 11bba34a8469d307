// ABOUTME: Task specification and runtime state types
// ABOUTME: Defines the per-task state machine driven by the execution engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::registry::ParamMap;

fn default_max_retries() -> u32 {
    3
}

/// Authoring-time description of one unit of work within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub operation: String,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl TaskSpec {
    pub fn new(id: &str, operation: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            operation: operation.to_string(),
            params: ParamMap::new(),
            depends_on: Vec::new(),
            timeout: None,
            max_retries: default_max_retries(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dependencies(mut self, depends_on: Vec<&str>) -> Self {
        self.depends_on = depends_on.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Classified task failure. The `kind` is the lookup key for recovery
/// policies; operations supply their own kinds through `OperationError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: String,
    pub message: String,
}

impl TaskError {
    pub const TIMEOUT: &'static str = "timeout";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn timeout(budget: Duration) -> Self {
        Self::new(Self::TIMEOUT, format!("task timed out after {:?}", budget))
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Runtime copy of a task spec inside one execution. Mutated exclusively by
/// the driver that owns the execution; never shared across executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub spec: TaskSpec,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<TaskError>,
    pub retry_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            retry_count: 0,
            started_at: None,
            finished_at: None,
            duration: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.stamp_finished();
    }

    pub fn mark_failed(&mut self, error: TaskError) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.stamp_finished();
    }

    pub fn mark_skipped(&mut self) {
        self.status = TaskStatus::Skipped;
        self.stamp_finished();
    }

    /// Resets the task to Pending for another attempt, consuming one unit of
    /// its retry budget.
    pub fn reset_for_retry(&mut self) {
        self.status = TaskStatus::Pending;
        self.result = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
        self.duration = None;
        self.retry_count += 1;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.spec.max_retries
    }

    fn stamp_finished(&mut self) {
        let finished = Utc::now();
        self.finished_at = Some(finished);
        self.duration = Some(
            (finished - self.started_at.unwrap_or(finished))
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
    }
}
