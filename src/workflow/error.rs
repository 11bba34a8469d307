// ABOUTME: Error types for workflow definition and validation
// ABOUTME: Covers lookup failures, structural problems, and document parsing errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("workflow '{workflow}' has no tasks")]
    EmptyWorkflow { workflow: String },

    #[error("duplicate task id '{task_id}' in workflow '{workflow}'")]
    DuplicateTask { workflow: String, task_id: String },

    #[error("task '{task_id}' depends on itself")]
    SelfDependency { task_id: String },

    #[error("circular dependency detected: {tasks:?}")]
    CircularDependency { tasks: Vec<String> },

    #[error("invalid workflow document: {0}")]
    Document(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DefinitionError>;
