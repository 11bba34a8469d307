// ABOUTME: Main library module for the drover workflow execution engine
// ABOUTME: Exports all core modules and provides the public API

pub mod config;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod registry;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, EngineConfig, LoggingConfig};
pub use engine::{
    EngineError, Execution, ExecutionEngine, ExecutionStatus, ExecutionSummary, RecoveryHook,
};
pub use metrics::{MetricRecorder, MetricSummary};
pub use recovery::{RecoveryError, RecoveryPolicyStore, RecoveryStrategy};
pub use registry::{Operation, OperationError, OperationRegistry, ParamMap};
pub use workflow::{
    DefinitionError, Task, TaskError, TaskSpec, TaskStatus, WorkflowDefinition, WorkflowStore,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
