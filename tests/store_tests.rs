// ABOUTME: Integration tests for workflow definition storage
// ABOUTME: YAML documents, validation failures, and template immutability

use std::time::Duration;

use drover::{DefinitionError, ExecutionStatus, OperationRegistry, TaskSpec, TaskStatus, WorkflowStore};

mod common;
use common::{engine_with, fast_config, wait_for_terminal};

const PIPELINE_YAML: &str = r#"
description: Three-stage pipeline with a parallel middle
tasks:
  extract:
    operation: echo
    params:
      message: extracted
    timeout: 30s
  transform_a:
    operation: echo
    depends_on: [extract]
  transform_b:
    operation: echo
    depends_on: [extract]
  load:
    operation: echo
    depends_on: [transform_a, transform_b]
    max_retries: 1
"#;

#[tokio::test]
async fn test_yaml_definition_executes() {
    let store = WorkflowStore::new();
    store.define_yaml("pipeline", PIPELINE_YAML).await.unwrap();

    let definition = store.get("pipeline").await.unwrap();
    assert_eq!(definition.task_count(), 4);
    assert_eq!(
        definition.tasks["extract"].timeout,
        Some(Duration::from_secs(30))
    );
    assert_eq!(definition.tasks["load"].max_retries, 1);

    let engine = engine_with(OperationRegistry::with_builtins(), store, fast_config());
    let execution_id = engine.start("pipeline").await.unwrap();

    let result = wait_for_terminal(&engine, &execution_id, Duration::from_secs(5)).await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    let extract = result.task("extract").unwrap();
    let load = result.task("load").unwrap();
    assert!(load.started_at.unwrap() >= extract.finished_at.unwrap());
}

#[tokio::test]
async fn test_yaml_task_ids_come_from_keys() {
    let store = WorkflowStore::new();
    store
        .define_yaml(
            "keyed",
            r#"
tasks:
  first:
    operation: echo
  second:
    name: Second stage
    operation: echo
    depends_on: [first]
"#,
        )
        .await
        .unwrap();

    let definition = store.get("keyed").await.unwrap();
    assert_eq!(definition.tasks["first"].id, "first");
    assert_eq!(definition.tasks["first"].name, "first");
    assert_eq!(definition.tasks["second"].name, "Second stage");
}

#[tokio::test]
async fn test_yaml_missing_operation_rejected() {
    let store = WorkflowStore::new();
    let result = store
        .define_yaml(
            "broken",
            r#"
tasks:
  incomplete:
    params:
      message: no operation here
"#,
        )
        .await;
    assert!(matches!(result, Err(DefinitionError::Document(_))));
}

#[tokio::test]
async fn test_yaml_cycle_rejected() {
    let store = WorkflowStore::new();
    let result = store
        .define_yaml(
            "loopy",
            r#"
tasks:
  a:
    operation: echo
    depends_on: [b]
  b:
    operation: echo
    depends_on: [a]
"#,
        )
        .await;
    assert!(matches!(
        result,
        Err(DefinitionError::CircularDependency { .. })
    ));
    assert!(!store.contains("loopy").await);
}

#[tokio::test]
async fn test_redefinition_overwrites() {
    let store = WorkflowStore::new();
    store
        .define("evolving", vec![TaskSpec::new("v1", "echo")])
        .await
        .unwrap();
    store
        .define(
            "evolving",
            vec![TaskSpec::new("v2a", "echo"), TaskSpec::new("v2b", "echo")],
        )
        .await
        .unwrap();

    let definition = store.get("evolving").await.unwrap();
    assert_eq!(definition.task_count(), 2);
    assert!(definition.tasks.contains_key("v2a"));
}

#[tokio::test]
async fn test_executions_do_not_share_task_state() {
    let store = WorkflowStore::new();
    store
        .define(
            "shared_template",
            vec![TaskSpec::new("work", "fail").with_max_retries(0)],
        )
        .await
        .unwrap();

    let engine = engine_with(OperationRegistry::with_builtins(), store, fast_config());

    let first = engine.start("shared_template").await.unwrap();
    wait_for_terminal(&engine, &first, Duration::from_secs(5)).await;

    // The first run's failure must not leak into a fresh materialization.
    let second = engine.start("shared_template").await.unwrap();
    let snapshot = wait_for_terminal(&engine, &second, Duration::from_secs(5)).await;

    let task = snapshot.task("work").unwrap();
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.status, TaskStatus::Failed);

    let first_snapshot = engine.status(&first).await.unwrap();
    assert_ne!(first_snapshot.id, snapshot.id);
}
