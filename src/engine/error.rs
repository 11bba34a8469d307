// ABOUTME: Error types for the execution engine
// ABOUTME: Configuration errors surfaced to callers; task failures stay in task state

use thiserror::Error;

use crate::registry::OperationError;
use crate::workflow::DefinitionError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("operation '{0}' is not registered")]
    UnknownOperation(String),

    #[error("task '{task_id}' rejected by operation '{operation}': {source}")]
    InvalidOperation {
        task_id: String,
        operation: String,
        #[source]
        source: OperationError,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
