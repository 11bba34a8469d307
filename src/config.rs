// ABOUTME: Configuration for the engine and its ambient concerns
// ABOUTME: Serde-backed structs with defaults, loadable from YAML

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_max_concurrent() -> usize {
    4
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker pool size: the number of tasks truly running in parallel.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Timeout applied to tasks that declare none of their own.
    #[serde(with = "humantime_serde", default = "default_task_timeout")]
    pub default_task_timeout: Duration,

    /// When true, dependents of a failed or skipped task are skipped instead
    /// of dispatched. The default preserves the terminal-unblocks policy: a
    /// dependency that reached any terminal status satisfies its dependents.
    #[serde(default)]
    pub propagate_failure: bool,

    /// Fallback tick between driver passes, bounding how quickly a
    /// cancellation is observed when no completions arrive.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            default_task_timeout: default_task_timeout(),
            propagate_failure: false,
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional cap on retained metric samples per series.
    #[serde(default)]
    pub metrics_retention: Option<usize>,
}

impl Config {
    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.default_task_timeout, Duration::from_secs(300));
        assert!(!config.propagate_failure);
    }

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(
            r#"
engine:
  max_concurrent_tasks: 8
  default_task_timeout: 30s
  propagate_failure: true
logging:
  level: debug
  format: json
metrics_retention: 1000
"#,
        )
        .unwrap();

        assert_eq!(config.engine.max_concurrent_tasks, 8);
        assert_eq!(config.engine.default_task_timeout, Duration::from_secs(30));
        assert!(config.engine.propagate_failure);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.metrics_retention, Some(1000));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.engine.max_concurrent_tasks, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.metrics_retention, None);
    }
}
