// ABOUTME: Recovery policy store mapping error classifications to strategies
// ABOUTME: Offered to callers wrapping failed tasks; not wired into the scheduler by default

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::engine::RecoveryHook;
use crate::workflow::{Task, TaskError};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("recovery strategy for kind '{kind}' failed: {message}")]
    StrategyFailed { kind: String, message: String },
}

/// A repair strategy for one error classification. Returns whether the task
/// should be attempted again.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    async fn recover(&self, task: &Task, error: &TaskError) -> Result<bool, RecoveryError>;
}

struct FnStrategy<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> RecoveryStrategy for FnStrategy<F>
where
    F: Fn(Task, TaskError) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, RecoveryError>> + Send,
{
    async fn recover(&self, task: &Task, error: &TaskError) -> Result<bool, RecoveryError> {
        (self.func)(task.clone(), error.clone()).await
    }
}

/// Maps a `TaskError` kind to a recovery strategy. Reusable on its own via
/// `attempt_recovery`, or wired into the engine as a `RecoveryHook`.
#[derive(Default)]
pub struct RecoveryPolicyStore {
    strategies: RwLock<HashMap<String, Arc<dyn RecoveryStrategy>>>,
}

impl RecoveryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_policy(&self, error_kind: &str, strategy: Arc<dyn RecoveryStrategy>) {
        info!("Registered recovery policy for kind '{}'", error_kind);
        self.strategies
            .write()
            .await
            .insert(error_kind.to_string(), strategy);
    }

    pub async fn register_policy_fn<F, Fut>(&self, error_kind: &str, func: F)
    where
        F: Fn(Task, TaskError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RecoveryError>> + Send + 'static,
    {
        self.register_policy(error_kind, Arc::new(FnStrategy { func }))
            .await;
    }

    pub async fn has_policy(&self, error_kind: &str) -> bool {
        self.strategies.read().await.contains_key(error_kind)
    }

    /// Looks up the strategy for the error's classification and invokes it.
    /// On a successful recovery the task is reset to Pending with one unit
    /// of retry budget consumed and its error cleared. A strategy error is
    /// returned to the caller and leaves the task as it was.
    pub async fn attempt_recovery(
        &self,
        task: &mut Task,
        error: &TaskError,
    ) -> Result<bool, RecoveryError> {
        let strategy = { self.strategies.read().await.get(&error.kind).cloned() };
        let Some(strategy) = strategy else {
            debug!(
                "No recovery policy for kind '{}' (task {})",
                error.kind, task.spec.id
            );
            return Ok(false);
        };

        match strategy.recover(task, error).await {
            Ok(true) => {
                task.reset_for_retry();
                info!("Recovery successful for task {}", task.spec.id);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(recovery_error) => {
                error!(
                    "Recovery strategy failed for task {}: {}",
                    task.spec.id, recovery_error
                );
                Err(recovery_error)
            }
        }
    }
}

#[async_trait]
impl RecoveryHook for RecoveryPolicyStore {
    async fn on_task_failure(&self, task: &Task, error: &TaskError) -> bool {
        let strategy = { self.strategies.read().await.get(&error.kind).cloned() };
        let Some(strategy) = strategy else {
            return false;
        };
        match strategy.recover(task, error).await {
            Ok(decision) => decision,
            Err(recovery_error) => {
                warn!(
                    "Recovery strategy failed for task {}: {}",
                    task.spec.id, recovery_error
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for RecoveryPolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPolicyStore").finish()
    }
}
