//! One-shot entry point: run the pipeline once and exit.
//!
//! Exit codes: 0 when state was loaded and persisted (even if sources or sinks failed),
//! 1 when the run aborted on state I/O, 2 on configuration errors.

use std::process::ExitCode;

use mention_monitor::metrics::Metrics;
use mention_monitor::{init_tracing, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let cfg = match MonitorConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    let monitor = match Monitor::from_config(&cfg) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = ?e, "could not set up monitor");
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        sources = monitor.source_count(),
        sinks = monitor.sink_count(),
        state = %cfg.state_path.display(),
        "monitor configured"
    );

    let code = match monitor.run_once().await {
        Ok(report) => {
            println!(
                "sources attempted: {} (failed: {}), candidates: {}, new mentions: {}, sinks notified: {}, total stored: {}",
                report.sources_attempted,
                report.source_failures.len(),
                report.candidates,
                report.new_mentions.len(),
                report.sinks_notified(),
                report.total_mentions,
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    };

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }
    code
}
