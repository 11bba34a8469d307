// ABOUTME: Operation registry mapping names to invocable operations
// ABOUTME: The sole extension point for task behavior; a minimal typed dispatch table

pub mod builtin;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::workflow::TaskError;

/// Flat parameter mapping passed as an operation's call arguments.
pub type ParamMap = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct OperationError {
    pub kind: String,
    pub message: String,
}

impl OperationError {
    pub const UNKNOWN_OPERATION: &'static str = "unknown_operation";
    pub const INVALID_PARAMS: &'static str = "invalid_params";
    pub const FAILED: &'static str = "operation_failed";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Self::FAILED, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self::new(
            Self::UNKNOWN_OPERATION,
            format!("operation '{}' is not registered", name),
        )
    }
}

impl From<OperationError> for TaskError {
    fn from(error: OperationError) -> Self {
        TaskError::new(error.kind, error.message)
    }
}

/// A named, invocable operation. Takes a flat parameter mapping and returns
/// a result value or a classified error. `validate_params` lets the registry
/// catch parameter-shape errors before execution rather than at invocation.
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn validate_params(&self, _params: &ParamMap) -> Result<(), OperationError> {
        Ok(())
    }

    async fn call(&self, params: &ParamMap) -> Result<Value, OperationError>;
}

struct FnOperation<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(ParamMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, params: &ParamMap) -> Result<Value, OperationError> {
        (self.func)(params.clone()).await
    }
}

/// Registry of operations keyed by name. Registration is intended to
/// complete before scheduling begins; afterwards the registry is shared
/// immutably (behind an `Arc`) with every driver.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the stock operations (`echo`, `sleep`,
    /// `fail`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::EchoOperation));
        registry.register(Arc::new(builtin::SleepOperation));
        registry.register(Arc::new(builtin::FailOperation));
        registry
    }

    /// Stores an operation under its name, overwriting silently on collision.
    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        let name = operation.name().to_string();
        debug!("Registered operation: {}", name);
        self.operations.insert(name, operation);
    }

    /// Registers a plain async closure as an operation.
    pub fn register_fn<F, Fut>(&mut self, name: &str, func: F)
    where
        F: Fn(ParamMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
    {
        self.register(Arc::new(FnOperation {
            name: name.to_string(),
            func,
        }));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.keys().map(|k| k.as_str()).collect()
    }

    /// Looks up and calls the operation with the supplied parameters. An
    /// absent name fails with an `unknown_operation`-classified error.
    pub async fn invoke(&self, name: &str, params: &ParamMap) -> Result<Value, OperationError> {
        match self.operations.get(name) {
            Some(operation) => operation.call(params).await,
            None => Err(OperationError::unknown_operation(name)),
        }
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.operation_names())
            .finish()
    }
}
