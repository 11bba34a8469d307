// ABOUTME: Dependency graph construction and structural validation
// ABOUTME: Detects self-dependencies and cycles in workflow definitions

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::HashMap;

use super::error::{DefinitionError, Result};
use super::task::TaskSpec;

pub struct DependencyGraph {
    graph: Graph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from a task map. Dependency ids that do not resolve
    /// to a task are left out of the graph; their runtime behavior (the task
    /// is permanently unready and gets skipped) is handled by the driver.
    pub fn from_specs(specs: &IndexMap<String, TaskSpec>) -> Self {
        let mut graph = Graph::new();
        let mut indices = HashMap::new();

        for task_id in specs.keys() {
            let node = graph.add_node(task_id.clone());
            indices.insert(task_id.clone(), node);
        }

        for (task_id, spec) in specs {
            let task_node = indices[task_id];
            for dependency in &spec.depends_on {
                if let Some(&dep_node) = indices.get(dependency) {
                    graph.add_edge(dep_node, task_node, ());
                }
            }
        }

        Self { graph, indices }
    }

    /// Validates the graph for self-dependencies and cycles.
    pub fn validate(&self) -> Result<()> {
        for (task_id, &node) in &self.indices {
            if self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .any(|dep| dep == node)
            {
                return Err(DefinitionError::SelfDependency {
                    task_id: task_id.clone(),
                });
            }
        }

        toposort(&self.graph, None).map_err(|cycle| DefinitionError::CircularDependency {
            tasks: vec![self.graph[cycle.node_id()].clone()],
        })?;

        Ok(())
    }

    /// Task ids with no dependencies within the graph.
    pub fn roots(&self) -> Vec<String> {
        self.indices
            .iter()
            .filter_map(|(task_id, &node)| {
                let has_dependencies = self
                    .graph
                    .neighbors_directed(node, petgraph::Direction::Incoming)
                    .next()
                    .is_some();
                if has_dependencies {
                    None
                } else {
                    Some(task_id.clone())
                }
            })
            .collect()
    }
}
