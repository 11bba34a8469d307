// ABOUTME: Metric recording and summary statistics
// ABOUTME: Timestamped sample series with windowed summaries and JSON export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: Value,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub latest: Option<f64>,
}

/// Appends timestamped samples per metric name and computes summary
/// statistics. Safe under concurrent recording from multiple drivers and
/// reader callers. History is unbounded unless a retention limit is set.
#[derive(Debug, Clone, Default)]
pub struct MetricRecorder {
    series: Arc<RwLock<HashMap<String, VecDeque<Sample>>>>,
    retention_limit: Option<usize>,
}

impl MetricRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of retained samples per metric; older samples roll
    /// off.
    pub fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = Some(limit);
        self
    }

    pub async fn record(&self, name: &str, value: impl Into<Value>) {
        self.record_with_metadata(name, value, HashMap::new()).await;
    }

    pub async fn record_with_metadata(
        &self,
        name: &str,
        value: impl Into<Value>,
        metadata: HashMap<String, String>,
    ) {
        let sample = Sample {
            timestamp: Utc::now(),
            value: value.into(),
            metadata,
        };

        let mut series = self.series.write().await;
        let samples = series.entry(name.to_string()).or_default();
        samples.push_back(sample);

        if let Some(limit) = self.retention_limit {
            while samples.len() > limit {
                samples.pop_front();
            }
        }
        debug!("Recorded metric {}", name);
    }

    /// Summary over an optional trailing window. Returns `None` for an
    /// unknown metric name or when no sample falls in the window; numeric
    /// statistics cover numeric samples only, so a series of non-numeric
    /// samples yields a count-only summary.
    pub async fn summarize(
        &self,
        name: &str,
        window: Option<chrono::Duration>,
    ) -> Option<MetricSummary> {
        let series = self.series.read().await;
        let samples = series.get(name)?;

        let cutoff = window.map(|w| Utc::now() - w);
        let in_range: Vec<&Sample> = samples
            .iter()
            .filter(|sample| cutoff.map_or(true, |cutoff| sample.timestamp > cutoff))
            .collect();

        if in_range.is_empty() {
            return None;
        }

        let values: Vec<f64> = in_range
            .iter()
            .filter_map(|sample| sample.value.as_f64())
            .collect();

        if values.is_empty() {
            return Some(MetricSummary {
                count: in_range.len(),
                min: None,
                max: None,
                avg: None,
                latest: None,
            });
        }

        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let latest = values.last().copied();

        Some(MetricSummary {
            count: in_range.len(),
            min: Some(min),
            max: Some(max),
            avg: Some(avg),
            latest,
        })
    }

    pub async fn sample_count(&self, name: &str) -> usize {
        self.series
            .read()
            .await
            .get(name)
            .map_or(0, VecDeque::len)
    }

    pub async fn metric_names(&self) -> Vec<String> {
        self.series.read().await.keys().cloned().collect()
    }

    /// Full name-to-history map, the shape consumed by persistence or
    /// offline analysis.
    pub async fn export(&self) -> HashMap<String, Vec<Sample>> {
        self.series
            .read()
            .await
            .iter()
            .map(|(name, samples)| (name.clone(), samples.iter().cloned().collect()))
            .collect()
    }

    /// Writes the exported history as pretty-printed JSON.
    pub async fn export_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let document = serde_json::to_string_pretty(&self.export().await)?;
        tokio::fs::write(path.as_ref(), document).await?;
        info!("Metrics exported to {}", path.as_ref().display());
        Ok(())
    }

    pub async fn reset(&self) {
        self.series.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_summary_round_trip() {
        let recorder = MetricRecorder::new();
        recorder.record("task_duration_ms", 10).await;
        recorder.record("task_duration_ms", 20).await;
        recorder.record("task_duration_ms", 30).await;

        let summary = recorder.summarize("task_duration_ms", None).await.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(30.0));
        assert_eq!(summary.avg, Some(20.0));
        assert_eq!(summary.latest, Some(30.0));
    }

    #[tokio::test]
    async fn test_unknown_metric_is_absent() {
        let recorder = MetricRecorder::new();
        assert!(recorder.summarize("missing", None).await.is_none());
    }

    #[tokio::test]
    async fn test_non_numeric_samples_count_only() {
        let recorder = MetricRecorder::new();
        recorder.record("deploy_target", json!("staging")).await;
        recorder.record("deploy_target", json!("production")).await;

        let summary = recorder.summarize("deploy_target", None).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.min, None);
        assert_eq!(summary.latest, None);
    }

    #[tokio::test]
    async fn test_window_excludes_old_samples() {
        let recorder = MetricRecorder::new();
        recorder.record("queue_depth", 5).await;

        let summary = recorder
            .summarize("queue_depth", Some(chrono::Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(summary.count, 1);

        // A window ending before the sample was recorded yields nothing.
        assert!(recorder
            .summarize("queue_depth", Some(chrono::Duration::zero()))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_retention_limit_rolls_off() {
        let recorder = MetricRecorder::new().with_retention_limit(2);
        recorder.record("m", 1).await;
        recorder.record("m", 2).await;
        recorder.record("m", 3).await;

        assert_eq!(recorder.sample_count("m").await, 2);
        let summary = recorder.summarize("m", None).await.unwrap();
        assert_eq!(summary.min, Some(2.0));
        assert_eq!(summary.latest, Some(3.0));
    }

    #[tokio::test]
    async fn test_export_shape() {
        let recorder = MetricRecorder::new();
        recorder
            .record_with_metadata(
                "tasks_completed",
                4,
                HashMap::from([("workflow".to_string(), "nightly".to_string())]),
            )
            .await;

        let exported = recorder.export().await;
        assert_eq!(exported.len(), 1);
        let samples = &exported["tasks_completed"];
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, json!(4));
        assert_eq!(samples[0].metadata["workflow"], "nightly");
    }
}
