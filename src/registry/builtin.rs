// ABOUTME: Stock operations shipped with the registry
// ABOUTME: Small echo/sleep/fail operations used by tests and demo workflows

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Operation, OperationError, ParamMap};

/// Returns its `message` parameter (empty string when absent).
pub struct EchoOperation;

#[async_trait]
impl Operation for EchoOperation {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, params: &ParamMap) -> Result<Value, OperationError> {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!(message))
    }
}

/// Sleeps for `duration_ms` milliseconds, simulating blocking work.
pub struct SleepOperation;

impl SleepOperation {
    fn duration_ms(params: &ParamMap) -> Result<u64, OperationError> {
        params
            .get("duration_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| OperationError::invalid_params("missing numeric 'duration_ms'"))
    }
}

#[async_trait]
impl Operation for SleepOperation {
    fn name(&self) -> &str {
        "sleep"
    }

    fn validate_params(&self, params: &ParamMap) -> Result<(), OperationError> {
        Self::duration_ms(params).map(|_| ())
    }

    async fn call(&self, params: &ParamMap) -> Result<Value, OperationError> {
        let duration_ms = Self::duration_ms(params)?;
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        Ok(json!({ "slept_ms": duration_ms }))
    }
}

/// Always fails, with an optional `kind` and `message` to control the
/// error classification.
pub struct FailOperation;

#[async_trait]
impl Operation for FailOperation {
    fn name(&self) -> &str {
        "fail"
    }

    async fn call(&self, params: &ParamMap) -> Result<Value, OperationError> {
        let kind = params
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or(OperationError::FAILED);
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("operation failed on request");
        Err(OperationError::new(kind, message))
    }
}
