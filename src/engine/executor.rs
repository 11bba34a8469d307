// ABOUTME: Execution engine and per-execution driver loop
// ABOUTME: Starts executions, dispatches ready tasks onto the worker pool, collects outcomes

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::error::{EngineError, Result};
use super::execution::{Execution, ExecutionStatus};
use super::pool::{PoolStats, WorkerPool};
use crate::config::EngineConfig;
use crate::registry::{OperationRegistry, ParamMap};
use crate::workflow::{Task, TaskError, TaskStatus, WorkflowStore};

use async_trait::async_trait;
use serde_json::Value;

/// Seam for wiring retry policies into the scheduler. Consulted on task
/// failure, before the task is marked terminal, and only while the task
/// still has retry budget. Returning true makes the driver reset the task
/// to Pending and dispatch it again once its dependencies allow.
#[async_trait]
pub trait RecoveryHook: Send + Sync {
    async fn on_task_failure(&self, task: &Task, error: &TaskError) -> bool;
}

/// The workflow execution engine. Owns no global state: it is constructed
/// from the registries it depends on and can be instantiated multiple times
/// in one process.
pub struct ExecutionEngine {
    registry: Arc<OperationRegistry>,
    store: Arc<WorkflowStore>,
    executions: Arc<RwLock<HashMap<String, Arc<RwLock<Execution>>>>>,
    pool: WorkerPool,
    config: EngineConfig,
    recovery: Option<Arc<dyn RecoveryHook>>,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<OperationRegistry>,
        store: Arc<WorkflowStore>,
        config: EngineConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.max_concurrent_tasks);
        Self {
            registry,
            store,
            executions: Arc::new(RwLock::new(HashMap::new())),
            pool,
            config,
            recovery: None,
        }
    }

    /// Installs a recovery hook consulted on task failure. The baseline
    /// engine runs without one; retry integration is the caller's choice.
    pub fn with_recovery(mut self, hook: Arc<dyn RecoveryHook>) -> Self {
        self.recovery = Some(hook);
        self
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Pre-flight check that every task's operation resolves in the registry
    /// and accepts its parameters. Optional: `start` keeps the baseline
    /// semantics where an unknown operation surfaces as a task failure
    /// discovered mid-execution.
    pub async fn validate(&self, definition: &str) -> Result<()> {
        let definition = self
            .store
            .get(definition)
            .await
            .ok_or_else(|| crate::workflow::DefinitionError::UnknownWorkflow(definition.into()))?;

        for (task_id, spec) in &definition.tasks {
            let operation = self
                .registry
                .get(&spec.operation)
                .ok_or_else(|| EngineError::UnknownOperation(spec.operation.clone()))?;
            operation
                .validate_params(&spec.params)
                .map_err(|source| EngineError::InvalidOperation {
                    task_id: task_id.clone(),
                    operation: spec.operation.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Instantiates the named definition and launches its driver. Returns
    /// the execution id immediately; completion is observed via `status`.
    #[instrument(skip(self))]
    pub async fn start(&self, definition: &str) -> Result<String> {
        let tasks = self.store.materialize(definition).await?;
        let execution_id = format!("{}-{}", definition, Uuid::new_v4().simple());

        let execution = Arc::new(RwLock::new(Execution::new(
            execution_id.clone(),
            definition.to_string(),
            tasks,
        )));
        self.executions
            .write()
            .await
            .insert(execution_id.clone(), Arc::clone(&execution));

        info!(
            "Starting execution {} of workflow '{}'",
            execution_id, definition
        );

        let driver = Driver {
            execution,
            registry: Arc::clone(&self.registry),
            pool: self.pool.clone(),
            recovery: self.recovery.clone(),
            propagate_failure: self.config.propagate_failure,
            default_timeout: self.config.default_task_timeout,
            poll_interval: self.config.poll_interval,
        };
        tokio::spawn(driver.run());

        Ok(execution_id)
    }

    /// Read-only snapshot of an execution; safe to call concurrently with
    /// the driver and idempotent once the execution is terminal.
    pub async fn status(&self, execution_id: &str) -> Option<Execution> {
        let executions = self.executions.read().await;
        let execution = executions.get(execution_id)?;
        let snapshot = execution.read().await.clone();
        Some(snapshot)
    }

    pub async fn execution_ids(&self) -> Vec<String> {
        self.executions.read().await.keys().cloned().collect()
    }

    /// Cooperative cancellation: flips a Running execution to Cancelled and
    /// returns true; returns false for terminal or unknown ids. In-flight
    /// tasks are not preempted; the driver stops dispatching once it
    /// observes the new status.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let executions = self.executions.read().await;
        let Some(execution) = executions.get(execution_id) else {
            return false;
        };
        let mut execution = execution.write().await;
        if execution.status != ExecutionStatus::Running {
            return false;
        }
        execution.mark_cancelled();
        info!("Cancelled execution {}", execution_id);
        true
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .finish()
    }
}

struct TaskOutcome {
    task_id: String,
    result: std::result::Result<Value, TaskError>,
}

/// One driver per execution: dispatches ready tasks, collects completions
/// from the worker channel, and finalizes the execution status.
struct Driver {
    execution: Arc<RwLock<Execution>>,
    registry: Arc<OperationRegistry>,
    pool: WorkerPool,
    recovery: Option<Arc<dyn RecoveryHook>>,
    propagate_failure: bool,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl Driver {
    async fn run(self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskOutcome>();
        let mut completed: HashSet<String> = HashSet::new();
        let mut in_flight: HashSet<String> = HashSet::new();

        loop {
            let cancelled =
                { self.execution.read().await.status == ExecutionStatus::Cancelled };

            if !cancelled {
                self.dispatch_ready(&mut completed, &mut in_flight, &tx).await;
            }

            if in_flight.is_empty() {
                let all_terminal = { self.execution.read().await.all_tasks_terminal() };
                if cancelled || all_terminal {
                    break;
                }
            }

            tokio::select! {
                outcome = rx.recv() => {
                    if let Some(outcome) = outcome {
                        self.collect(outcome, &mut completed, &mut in_flight).await;
                        while let Ok(outcome) = rx.try_recv() {
                            self.collect(outcome, &mut completed, &mut in_flight).await;
                        }
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        let mut execution = self.execution.write().await;
        execution.finalize();
        info!(
            "Execution {} finished with status {}",
            execution.id, execution.status
        );
    }

    /// Dispatch phase. Dependency satisfaction is membership in the
    /// completed set, i.e. "reached a terminal status", not "succeeded" —
    /// unless `propagate_failure` is on, in which case dependents of failed
    /// or skipped tasks are skipped instead of dispatched. Tasks whose
    /// dependency ids do not resolve within the execution can never become
    /// ready and are skipped as well.
    async fn dispatch_ready(
        &self,
        completed: &mut HashSet<String>,
        in_flight: &mut HashSet<String>,
        tx: &mpsc::UnboundedSender<TaskOutcome>,
    ) {
        let mut to_spawn: Vec<(String, String, ParamMap, Duration)> = Vec::new();

        {
            let mut execution = self.execution.write().await;
            let task_ids: Vec<String> = execution.tasks.keys().cloned().collect();

            for task_id in task_ids {
                if in_flight.contains(&task_id) || completed.contains(&task_id) {
                    continue;
                }

                let (dangling, blocked, ready) = {
                    let Some(task) = execution.tasks.get(&task_id) else {
                        continue;
                    };
                    if task.status != TaskStatus::Pending {
                        continue;
                    }
                    let dangling = task
                        .spec
                        .depends_on
                        .iter()
                        .any(|dep| !execution.tasks.contains_key(dep));
                    let blocked = self.propagate_failure
                        && task.spec.depends_on.iter().any(|dep| {
                            execution.tasks.get(dep).map_or(false, |dep_task| {
                                matches!(
                                    dep_task.status,
                                    TaskStatus::Failed | TaskStatus::Skipped
                                )
                            })
                        });
                    let ready = task
                        .spec
                        .depends_on
                        .iter()
                        .all(|dep| completed.contains(dep));
                    (dangling, blocked, ready)
                };

                if dangling || blocked {
                    if let Some(task) = execution.tasks.get_mut(&task_id) {
                        if dangling {
                            warn!(
                                "Skipping task {}: dependencies cannot be satisfied",
                                task_id
                            );
                        } else {
                            debug!("Skipping task {}: upstream failure propagated", task_id);
                        }
                        task.mark_skipped();
                    }
                    completed.insert(task_id);
                    continue;
                }

                if ready {
                    if let Some(task) = execution.tasks.get_mut(&task_id) {
                        task.mark_running();
                        let budget = task.spec.timeout.unwrap_or(self.default_timeout);
                        to_spawn.push((
                            task_id.clone(),
                            task.spec.operation.clone(),
                            task.spec.params.clone(),
                            budget,
                        ));
                        in_flight.insert(task_id);
                    }
                }
            }
        }

        for (task_id, operation, params, budget) in to_spawn {
            self.spawn_worker(task_id, operation, params, budget, tx.clone());
        }
    }

    /// Runs one task on the shared pool. Operation errors, registry lookup
    /// failures, and timeouts are all converted into task outcomes; nothing
    /// propagates out of the worker.
    fn spawn_worker(
        &self,
        task_id: String,
        operation: String,
        params: ParamMap,
        budget: Duration,
        tx: mpsc::UnboundedSender<TaskOutcome>,
    ) {
        let registry = Arc::clone(&self.registry);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let _permit = pool.acquire().await;
            debug!("Invoking operation '{}' for task {}", operation, task_id);

            let result = match timeout(budget, registry.invoke(&operation, &params)).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(operation_error)) => Err(TaskError::from(operation_error)),
                Err(_) => {
                    warn!("Task {} timed out after {:?}", task_id, budget);
                    Err(TaskError::timeout(budget))
                }
            };

            let _ = tx.send(TaskOutcome { task_id, result });
        });
    }

    /// Collection phase for one completed worker.
    async fn collect(
        &self,
        outcome: TaskOutcome,
        completed: &mut HashSet<String>,
        in_flight: &mut HashSet<String>,
    ) {
        in_flight.remove(&outcome.task_id);

        let mut execution = self.execution.write().await;
        let Some(task) = execution.tasks.get_mut(&outcome.task_id) else {
            return;
        };

        match outcome.result {
            Ok(value) => {
                task.mark_completed(value);
                debug!("Task {} completed", outcome.task_id);
                completed.insert(outcome.task_id);
            }
            Err(task_error) => {
                if task.can_retry() {
                    if let Some(hook) = &self.recovery {
                        if hook.on_task_failure(task, &task_error).await {
                            task.reset_for_retry();
                            info!(
                                "Task {} recovered, retry {}/{}",
                                outcome.task_id, task.retry_count, task.spec.max_retries
                            );
                            return;
                        }
                    }
                }
                error!("Task {} failed: {}", outcome.task_id, task_error);
                task.mark_failed(task_error);
                completed.insert(outcome.task_id);
            }
        }
    }
}
