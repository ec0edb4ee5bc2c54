//! Tracer lifecycle and correlation metrics
//!
//! Counters are updated by the tracer handle and the resolver, and can be
//! exported in Prometheus text format or as JSON.

use crate::kind::TracerKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-session metrics collector
#[derive(Debug)]
pub struct TracerMetrics {
    /// When the collector was started
    start_time: Instant,
    /// Tracer lifecycle counters
    pub lifecycle: LifecycleMetrics,
    /// Path and tag correlation counters
    pub correlation: CorrelationMetrics,
    /// Tracers created per kind
    created_by_kind: parking_lot::RwLock<HashMap<TracerKind, u64>>,
}

impl Default for TracerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TracerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            lifecycle: LifecycleMetrics::default(),
            correlation: CorrelationMetrics::default(),
            created_by_kind: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn record_created(&self, kind: TracerKind) {
        self.lifecycle.created.fetch_add(1, Ordering::Relaxed);
        *self.created_by_kind.write().entry(kind).or_insert(0) += 1;
    }

    pub fn record_started(&self) {
        self.lifecycle.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ended(&self) {
        self.lifecycle.ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.lifecycle.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leaked(&self) {
        self.lifecycle.leaked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_usage_error(&self) {
        self.lifecycle.usage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_path_completed(&self) {
        self.correlation.paths_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution(&self, linked: u64, unresolved: u64) {
        self.correlation
            .tags_resolved
            .fetch_add(linked, Ordering::Relaxed);
        self.correlation
            .tags_unresolved
            .fetch_add(unresolved, Ordering::Relaxed);
    }

    /// Number of tracers created for a kind
    pub fn created_count(&self, kind: TracerKind) -> u64 {
        self.created_by_kind.read().get(&kind).copied().unwrap_or(0)
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP tracepath_uptime_seconds Time since the session started\n");
        output.push_str("# TYPE tracepath_uptime_seconds gauge\n");
        output.push_str(&format!(
            "tracepath_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP tracepath_tracers_total Tracer lifecycle transitions\n");
        output.push_str("# TYPE tracepath_tracers_total counter\n");
        for (event, counter) in [
            ("created", &self.lifecycle.created),
            ("started", &self.lifecycle.started),
            ("ended", &self.lifecycle.ended),
            ("failed", &self.lifecycle.failed),
            ("leaked", &self.lifecycle.leaked),
        ] {
            output.push_str(&format!(
                "tracepath_tracers_total{{event=\"{}\"}} {}\n",
                event,
                counter.load(Ordering::Relaxed)
            ));
        }
        output.push('\n');

        let by_kind = self.created_by_kind.read();
        if !by_kind.is_empty() {
            output.push_str("# HELP tracepath_tracers_created_total Tracers created per kind\n");
            output.push_str("# TYPE tracepath_tracers_created_total counter\n");
            let mut kinds: Vec<_> = by_kind.iter().collect();
            kinds.sort_by_key(|(kind, _)| kind.to_string());
            for (kind, count) in kinds {
                output.push_str(&format!(
                    "tracepath_tracers_created_total{{kind=\"{}\"}} {}\n",
                    kind, count
                ));
            }
            output.push('\n');
        }

        output.push_str("# HELP tracepath_usage_errors_total Tracer API misuse\n");
        output.push_str("# TYPE tracepath_usage_errors_total counter\n");
        output.push_str(&format!(
            "tracepath_usage_errors_total {}\n\n",
            self.lifecycle.usage_errors.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tracepath_paths_completed_total Completed root paths\n");
        output.push_str("# TYPE tracepath_paths_completed_total counter\n");
        output.push_str(&format!(
            "tracepath_paths_completed_total {}\n\n",
            self.correlation.paths_completed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tracepath_tags_total Incoming tags processed by the resolver\n");
        output.push_str("# TYPE tracepath_tags_total counter\n");
        output.push_str(&format!(
            "tracepath_tags_total{{result=\"resolved\"}} {}\n",
            self.correlation.tags_resolved.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "tracepath_tags_total{{result=\"unresolved\"}} {}\n",
            self.correlation.tags_unresolved.load(Ordering::Relaxed)
        ));

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let by_kind: HashMap<String, u64> = self
            .created_by_kind
            .read()
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect();

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "lifecycle": {
                "created": self.lifecycle.created.load(Ordering::Relaxed),
                "started": self.lifecycle.started.load(Ordering::Relaxed),
                "ended": self.lifecycle.ended.load(Ordering::Relaxed),
                "failed": self.lifecycle.failed.load(Ordering::Relaxed),
                "leaked": self.lifecycle.leaked.load(Ordering::Relaxed),
                "usage_errors": self.lifecycle.usage_errors.load(Ordering::Relaxed),
                "created_by_kind": by_kind,
            },
            "correlation": {
                "paths_completed": self.correlation.paths_completed.load(Ordering::Relaxed),
                "tags_resolved": self.correlation.tags_resolved.load(Ordering::Relaxed),
                "tags_unresolved": self.correlation.tags_unresolved.load(Ordering::Relaxed),
            },
        })
    }
}

/// Tracer lifecycle counters
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub created: AtomicU64,
    pub started: AtomicU64,
    pub ended: AtomicU64,
    pub failed: AtomicU64,
    pub leaked: AtomicU64,
    pub usage_errors: AtomicU64,
}

/// Path and tag correlation counters
#[derive(Debug, Default)]
pub struct CorrelationMetrics {
    pub paths_completed: AtomicU64,
    pub tags_resolved: AtomicU64,
    pub tags_unresolved: AtomicU64,
}

/// Shared metrics instance
pub type SharedMetrics = Arc<TracerMetrics>;

/// Create a new shared metrics collector
pub fn create_metrics() -> SharedMetrics {
    Arc::new(TracerMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = TracerMetrics::new();
        metrics.record_created(TracerKind::CustomService);
        metrics.record_created(TracerKind::CustomService);
        metrics.record_created(TracerKind::DatabaseRequest);
        metrics.record_started();
        metrics.record_resolution(2, 1);

        assert_eq!(metrics.lifecycle.created.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.created_count(TracerKind::CustomService), 2);
        assert_eq!(metrics.created_count(TracerKind::InProcessLink), 0);
        assert_eq!(metrics.correlation.tags_resolved.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = TracerMetrics::new();
        metrics.record_created(TracerKind::IncomingRemoteCall);
        metrics.record_leaked();

        let text = metrics.to_prometheus();
        assert!(text.contains("tracepath_tracers_total{event=\"created\"} 1"));
        assert!(text.contains("tracepath_tracers_total{event=\"leaked\"} 1"));
        assert!(text.contains("tracepath_tracers_created_total{kind=\"IncomingRemoteCall\"} 1"));
        assert!(text.contains("tracepath_tags_total{result=\"unresolved\"} 0"));
    }

    #[test]
    fn test_json_output() {
        let metrics = TracerMetrics::new();
        metrics.record_path_completed();
        metrics.record_usage_error();

        let json = metrics.to_json();
        assert_eq!(json["correlation"]["paths_completed"], 1);
        assert_eq!(json["lifecycle"]["usage_errors"], 1);
    }
}
