// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mention_monitor::notify::{deliver_each, ItemOutcome};
use mention_monitor::{
    stable_id, DeliveryReport, Mention, Monitor, RunSettings, Sink, Source, SourceError,
    StateStore,
};
use parking_lot::Mutex;
use tokio::time::Instant;

pub fn mention(prefix: &str, native: &str, source: &str) -> Mention {
    Mention::new(
        stable_id(prefix, native),
        source,
        "post",
        "lazypg",
        format!("https://{source}.test/{native}"),
    )
    .title(format!("{source} item {native}"))
}

/// Returns the same candidates on every call.
pub struct StaticSource {
    pub name: &'static str,
    pub items: Vec<Mention>,
    pub calls: Mutex<usize>,
}

impl StaticSource {
    pub fn new(name: &'static str, items: Vec<Mention>) -> Arc<Self> {
        Arc::new(Self {
            name,
            items,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn collect(&self, _keywords: &[String], _deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        *self.calls.lock() += 1;
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub struct FailingSource;

#[async_trait]
impl Source for FailingSource {
    async fn collect(&self, _keywords: &[String], _deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        Err(SourceError::Status {
            endpoint: "https://down.test".into(),
            status: 503,
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Ignores the deadline and sleeps; the aggregator has to cut it off.
pub struct SlowSource {
    pub delay: Duration,
    pub items: Vec<Mention>,
}

#[async_trait]
impl Source for SlowSource {
    async fn collect(&self, _keywords: &[String], _deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Records every batch it receives. Fails the listed ids individually.
pub struct RecordingSink {
    pub name: &'static str,
    pub batches: Mutex<Vec<Vec<String>>>,
    pub attempted: Mutex<Vec<String>>,
    pub fail_ids: Vec<String>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> Arc<Self> {
        Self::failing_on(name, &[])
    }

    pub fn failing_on(name: &'static str, ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            batches: Mutex::new(Vec::new()),
            attempted: Mutex::new(Vec::new()),
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        self.batches
            .lock()
            .push(batch.iter().map(|m| m.id.clone()).collect());
        Ok(deliver_each(self.name, batch, |m| {
            self.attempted.lock().push(m.id.clone());
            let fail = self.fail_ids.contains(&m.id);
            async move {
                if fail {
                    Err(anyhow!("rejected {}", m.id))
                } else {
                    Ok(ItemOutcome::Delivered)
                }
            }
        })
        .await)
    }
}

/// Unreachable backend: fails the whole batch.
pub struct DownSink;

#[async_trait]
impl Sink for DownSink {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn send(&self, _batch: &[Mention]) -> Result<DeliveryReport> {
        Err(anyhow!("connection refused"))
    }
}

pub fn settings() -> RunSettings {
    RunSettings {
        run_timeout: Duration::from_secs(5),
        source_concurrency: 4,
        sink_timeout: Duration::from_secs(5),
    }
}

pub fn monitor(
    sources: Vec<Arc<dyn Source>>,
    sinks: Vec<Arc<dyn Sink>>,
    store: &StateStore,
) -> Monitor {
    Monitor::new(
        sources,
        sinks,
        store.clone(),
        vec!["lazypg".to_string(), "rebelice/lazypg".to_string()],
        settings(),
    )
}
