use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Register help text for every metric the monitor emits. Safe to call repeatedly.
pub fn ensure_described() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        describe_counter!("monitor_runs_total", "Completed monitor runs");
        describe_counter!(
            "monitor_source_errors_total",
            "Sources that failed or timed out, by source"
        );
        describe_counter!("monitor_candidates_total", "Valid candidates collected");
        describe_counter!("monitor_malformed_total", "Candidates dropped for missing id or url");
        describe_counter!("monitor_new_mentions_total", "Mentions accepted as new");
        describe_counter!(
            "monitor_sink_failures_total",
            "Sinks that failed or lost items, by sink"
        );
        describe_histogram!(
            "monitor_source_duration_ms",
            Unit::Milliseconds,
            "Wall time per source collect call"
        );
        describe_gauge!("monitor_last_run_ts", Unit::Seconds, "Unix time of the last persisted run");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition text for a node-exporter textfile collector.
    /// The file is replaced atomically so the collector never reads half of it.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render()).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}
