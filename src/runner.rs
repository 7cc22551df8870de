// src/runner.rs
//! One run: Load → Aggregate → Dedup → Dispatch → Persist.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::time::Instant;

use crate::config::MonitorConfig;
use crate::dedup::DedupStore;
use crate::ingest::providers::{default_sources, http_client};
use crate::ingest::types::Source;
use crate::ingest::Aggregator;
use crate::mention::Mention;
use crate::notify::{dispatch, sinks_from_config, Sink, SinkReport};
use crate::state::{StateError, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Deadline for source collection, measured from the start of aggregation.
    pub run_timeout: Duration,
    pub source_concurrency: usize,
    /// Budget for each sink's whole batch.
    pub sink_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(300),
            source_concurrency: 4,
            sink_timeout: Duration::from_secs(60),
        }
    }
}

/// The only ways a run can abort. Source and sink failures never end up here.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("loading run state: {0}")]
    Load(#[source] StateError),
    #[error("persisting run state: {0}")]
    Persist(#[source] StateError),
}

/// Counts for one completed run.
#[derive(Debug)]
pub struct RunReport {
    pub sources_attempted: usize,
    /// `(source, error)` for every source that contributed nothing because it failed.
    pub source_failures: Vec<(&'static str, String)>,
    pub candidates: usize,
    pub malformed: usize,
    /// The batch handed to sinks, in first-seen order.
    pub new_mentions: Vec<Mention>,
    /// Empty when there was nothing new to dispatch.
    pub sinks: Vec<SinkReport>,
    /// Size of the persisted log after this run.
    pub total_mentions: usize,
    pub last_updated: DateTime<Utc>,
}

impl RunReport {
    pub fn sinks_notified(&self) -> usize {
        self.sinks.iter().filter(|s| s.result.is_ok()).count()
    }

    pub fn sinks_failed(&self) -> usize {
        self.sinks.iter().filter(|s| s.has_failures()).count()
    }
}

pub struct Monitor {
    aggregator: Aggregator,
    sinks: Vec<Arc<dyn Sink>>,
    store: StateStore,
    keywords: Vec<String>,
    settings: RunSettings,
}

impl Monitor {
    pub fn new(
        sources: Vec<Arc<dyn Source>>,
        sinks: Vec<Arc<dyn Sink>>,
        store: StateStore,
        keywords: Vec<String>,
        settings: RunSettings,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(sources, settings.source_concurrency),
            sinks,
            store,
            keywords,
            settings,
        }
    }

    /// Every enabled source and every configured sink.
    pub fn from_config(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let client = http_client()?;
        let sources = default_sources(&cfg.sources, &client);
        let sinks = sinks_from_config(&cfg.sinks, &client).context("configuring sinks")?;
        Ok(Self::new(
            sources,
            sinks,
            StateStore::new(&cfg.state_path),
            cfg.keywords.clone(),
            cfg.run.clone(),
        ))
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn source_count(&self) -> usize {
        self.aggregator.source_count()
    }

    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        // Load
        let state = self.store.load().await.map_err(RunError::Load)?;
        tracing::info!(
            existing = state.mentions.len(),
            keywords = ?self.keywords,
            "starting run"
        );

        // Aggregate
        let deadline = Instant::now() + self.settings.run_timeout;
        let discovered_at = Utc::now();
        let agg = self
            .aggregator
            .collect_all(&self.keywords, deadline, discovered_at)
            .await;
        let source_failures: Vec<_> = agg
            .failed_sources()
            .map(|o| (o.source, o.result.clone().err().unwrap_or_default()))
            .collect();
        let candidates = agg.candidates.len();

        // Dedup
        let mut dedup = DedupStore::new(state);
        let new_mentions = dedup.admit(agg.candidates);
        counter!("monitor_new_mentions_total").increment(new_mentions.len() as u64);

        // Dispatch
        let sinks = if new_mentions.is_empty() {
            tracing::debug!("nothing new, sinks not invoked");
            Vec::new()
        } else {
            dispatch(&self.sinks, &new_mentions, self.settings.sink_timeout).await
        };

        // Persist
        let mut state = dedup.into_state();
        let last_updated = Utc::now();
        state.last_updated = Some(last_updated);
        self.store.save(&state).await.map_err(RunError::Persist)?;

        counter!("monitor_runs_total").increment(1);
        gauge!("monitor_last_run_ts").set(last_updated.timestamp() as f64);

        let report = RunReport {
            sources_attempted: agg.outcomes.len(),
            source_failures,
            candidates,
            malformed: agg.malformed,
            new_mentions,
            sinks,
            total_mentions: state.mentions.len(),
            last_updated,
        };
        tracing::info!(
            sources = report.sources_attempted,
            sources_failed = report.source_failures.len(),
            candidates = report.candidates,
            malformed = report.malformed,
            new = report.new_mentions.len(),
            sinks_notified = report.sinks_notified(),
            sinks_failed = report.sinks_failed(),
            total = report.total_mentions,
            "run complete"
        );
        Ok(report)
    }
}
