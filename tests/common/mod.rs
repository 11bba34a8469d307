// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Stub operations, engine construction, and terminal-state polling

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drover::{
    EngineConfig, Execution, ExecutionEngine, Operation, OperationError, OperationRegistry,
    ParamMap, TaskStatus, WorkflowStore,
};

/// Engine config tuned for fast test turnaround.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        max_concurrent_tasks: 4,
        default_task_timeout: Duration::from_secs(5),
        propagate_failure: false,
        poll_interval: Duration::from_millis(10),
    }
}

pub fn engine_with(
    registry: OperationRegistry,
    store: WorkflowStore,
    config: EngineConfig,
) -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(registry), Arc::new(store), config)
}

/// Fails its first `failures` calls with the given error kind, then
/// succeeds, reporting which attempt got through.
pub struct FlakyOperation {
    name: String,
    failures: u32,
    kind: String,
    calls: AtomicU32,
}

impl FlakyOperation {
    pub fn new(name: &str, failures: u32, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            failures,
            kind: kind.to_string(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Operation for FlakyOperation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _params: &ParamMap) -> Result<Value, OperationError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(OperationError::new(
                self.kind.clone(),
                format!("attempt {} failed", attempt),
            ))
        } else {
            Ok(json!({ "attempt": attempt }))
        }
    }
}

/// Tracks how many invocations run concurrently, holding each one briefly.
pub struct TrackingOperation {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    hold: Duration,
}

impl TrackingOperation {
    pub fn new(hold: Duration) -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Self {
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::clone(&peak),
                hold,
            },
            peak,
        )
    }
}

#[async_trait]
impl Operation for TrackingOperation {
    fn name(&self) -> &str {
        "track"
    }

    async fn call(&self, _params: &ParamMap) -> Result<Value, OperationError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Polls until the execution reaches a terminal status.
pub async fn wait_for_terminal(
    engine: &ExecutionEngine,
    execution_id: &str,
    max_wait: Duration,
) -> Execution {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        if let Some(snapshot) = engine.status(execution_id).await {
            if snapshot.status.is_terminal() {
                return snapshot;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "execution {} did not reach a terminal status within {:?}",
            execution_id,
            max_wait
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Polls until no task is Running, so in-flight work after a cancellation
/// has drained.
pub async fn wait_until_drained(
    engine: &ExecutionEngine,
    execution_id: &str,
    max_wait: Duration,
) -> Execution {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        let snapshot = engine
            .status(execution_id)
            .await
            .expect("execution should exist");
        if snapshot
            .tasks
            .values()
            .all(|task| task.status != TaskStatus::Running)
        {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "execution {} still has running tasks after {:?}",
            execution_id,
            max_wait
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
