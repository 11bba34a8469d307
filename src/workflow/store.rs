// ABOUTME: Workflow definition storage and instantiation
// ABOUTME: Holds named immutable templates and materializes fresh task sets per run

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::{DefinitionError, Result};
use super::graph::DependencyGraph;
use super::task::{Task, TaskSpec};

/// A named, immutable workflow template. Instantiating an execution
/// deep-copies the task list so each run starts from Pending state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub tasks: IndexMap<String, TaskSpec>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// YAML document shape for `define_yaml`. Task ids come from the map keys,
/// the same way the engine's spec builder sets them explicitly.
#[derive(Debug, Deserialize)]
struct WorkflowDocument {
    #[serde(default)]
    description: Option<String>,
    tasks: IndexMap<String, TaskSpec>,
}

#[derive(Debug, Default)]
pub struct WorkflowStore {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a task-specification list under a name, overwriting silently
    /// on collision. Rejects empty names, duplicate task ids, and dependency
    /// cycles; dangling dependency ids are only warned about, since their
    /// runtime behavior is defined (the task is skipped as permanently
    /// unready).
    pub async fn define(&self, name: &str, specs: Vec<TaskSpec>) -> Result<()> {
        let mut tasks = IndexMap::with_capacity(specs.len());
        for spec in specs {
            let task_id = spec.id.clone();
            if tasks.insert(task_id.clone(), spec).is_some() {
                return Err(DefinitionError::DuplicateTask {
                    workflow: name.to_string(),
                    task_id,
                });
            }
        }
        self.define_tasks(name, None, tasks).await
    }

    /// Parses a YAML workflow document and stores it under a name.
    pub async fn define_yaml(&self, name: &str, document: &str) -> Result<()> {
        let document: WorkflowDocument = serde_yaml::from_str(document)?;
        let mut tasks = document.tasks;
        for (task_id, spec) in &mut tasks {
            spec.id = task_id.clone();
            if spec.name.is_empty() {
                spec.name = task_id.clone();
            }
        }
        self.define_tasks(name, document.description, tasks).await
    }

    /// Returns a fresh deep copy of the stored tasks, all Pending, for
    /// starting a new execution.
    pub async fn materialize(&self, name: &str) -> Result<IndexMap<String, Task>> {
        let definitions = self.definitions.read().await;
        let definition = definitions
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownWorkflow(name.to_string()))?;

        debug!(
            "Materializing workflow '{}' ({} tasks)",
            name,
            definition.task_count()
        );

        Ok(definition
            .tasks
            .values()
            .map(|spec| (spec.id.clone(), Task::new(spec.clone())))
            .collect())
    }

    pub async fn get(&self, name: &str) -> Option<WorkflowDefinition> {
        self.definitions.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.definitions.read().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        self.definitions.read().await.keys().cloned().collect()
    }

    async fn define_tasks(
        &self,
        name: &str,
        description: Option<String>,
        tasks: IndexMap<String, TaskSpec>,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if tasks.is_empty() {
            return Err(DefinitionError::EmptyWorkflow {
                workflow: name.to_string(),
            });
        }

        DependencyGraph::from_specs(&tasks).validate()?;

        for (task_id, spec) in &tasks {
            for dependency in &spec.depends_on {
                if !tasks.contains_key(dependency) {
                    warn!(
                        "Task '{}' in workflow '{}' depends on unknown task '{}'; it will be skipped at runtime",
                        task_id, name, dependency
                    );
                }
            }
        }

        let definition = WorkflowDefinition {
            name: name.to_string(),
            description,
            tasks,
            created_at: Utc::now(),
        };

        info!(
            "Defined workflow '{}' with {} tasks",
            name,
            definition.task_count()
        );
        self.definitions
            .write()
            .await
            .insert(name.to_string(), definition);
        Ok(())
    }
}
