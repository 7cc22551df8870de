// src/notify/mod.rs
//! Sinks: where newly accepted mentions go once the run has committed them as seen.

pub mod bark;
pub mod discord;
pub mod email;
pub mod mongodb;
pub mod notion;
pub mod postgres;
pub mod slack;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::join_all;
use metrics::counter;

use crate::config::SinksConfig;
use crate::mention::Mention;

/// One delivery backend. Never sees the full log, only this run's new mentions.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `batch` in order. `Err` means the sink as a whole failed;
    /// per-item failures go into the report instead.
    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport>;
}

/// What a sink did with one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Already present in the backend.
    pub skipped: usize,
    /// `(mention id, error)`, in batch order.
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    /// A single aggregated payload carrying the whole batch.
    pub fn whole_batch(len: usize) -> Self {
        Self {
            attempted: len,
            delivered: len,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-item result reported by the closure given to [`deliver_each`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    AlreadyPresent,
}

/// Deliver items one at a time. A failing item is recorded and the rest are still attempted.
pub async fn deliver_each<'a, F, Fut>(sink: &'static str, batch: &'a [Mention], mut deliver: F) -> DeliveryReport
where
    F: FnMut(&'a Mention) -> Fut,
    Fut: Future<Output = Result<ItemOutcome>>,
{
    let mut report = DeliveryReport::default();
    for m in batch {
        report.attempted += 1;
        match deliver(m).await {
            Ok(ItemOutcome::Delivered) => report.delivered += 1,
            Ok(ItemOutcome::AlreadyPresent) => report.skipped += 1,
            Err(e) => {
                let error = format!("{e:#}");
                tracing::warn!(sink, id = %m.id, error = %error, "item delivery failed");
                report.failed.push((m.id.clone(), error));
            }
        }
    }
    report
}

/// What one sink did in a run.
#[derive(Debug)]
pub struct SinkReport {
    pub sink: &'static str,
    pub elapsed: Duration,
    pub result: Result<DeliveryReport, String>,
}

impl SinkReport {
    /// True when the sink failed outright or lost at least one item.
    pub fn has_failures(&self) -> bool {
        match &self.result {
            Ok(r) => !r.is_clean(),
            Err(_) => true,
        }
    }
}

/// Hand `batch` to every sink concurrently, each bounded by `per_sink`.
///
/// Reports come back in sink registration order. Nothing here fails the run.
pub async fn dispatch(sinks: &[Arc<dyn Sink>], batch: &[Mention], per_sink: Duration) -> Vec<SinkReport> {
    if batch.is_empty() {
        return Vec::new();
    }
    let calls = sinks.iter().map(|sink| async move {
        let t0 = Instant::now();
        let result = match tokio::time::timeout(per_sink, sink.send(batch)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("timed out after {}s", per_sink.as_secs())),
        };
        SinkReport {
            sink: sink.name(),
            elapsed: t0.elapsed(),
            result,
        }
    });
    let reports = join_all(calls).await;

    for r in &reports {
        match &r.result {
            Ok(d) if d.is_clean() => {
                tracing::info!(sink = r.sink, delivered = d.delivered, skipped = d.skipped, "sink done")
            }
            Ok(d) => {
                counter!("monitor_sink_failures_total", "sink" => r.sink).increment(1);
                tracing::warn!(sink = r.sink, delivered = d.delivered, failed = d.failed.len(), "sink partially failed");
            }
            Err(e) => {
                counter!("monitor_sink_failures_total", "sink" => r.sink).increment(1);
                tracing::warn!(sink = r.sink, error = %e, "sink failed");
            }
        }
    }
    reports
}

/// Register every sink whose configuration is present.
pub fn sinks_from_config(cfg: &SinksConfig, client: &reqwest::Client) -> Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    if let Some(url) = &cfg.database_url {
        sinks.push(Arc::new(postgres::PostgresSink::connect_lazy(url).context("postgres sink")?));
    }
    if let Some(uri) = &cfg.mongodb_uri {
        sinks.push(Arc::new(mongodb::MongoSink::connect_lazy(uri).context("mongodb sink")?));
    }
    if let Some(bark) = &cfg.bark {
        sinks.push(Arc::new(bark::BarkSink::new(client.clone(), bark)));
    }
    if let Some(notion) = &cfg.notion {
        sinks.push(Arc::new(notion::NotionSink::new(client.clone(), notion)));
    }
    if let Some(url) = &cfg.slack_webhook {
        sinks.push(Arc::new(slack::SlackSink::new(client.clone(), url.clone())));
    }
    if let Some(url) = &cfg.discord_webhook {
        sinks.push(Arc::new(discord::DiscordSink::new(client.clone(), url.clone())));
    }
    if let Some(email) = &cfg.email {
        sinks.push(Arc::new(email::EmailSink::new(email).context("email sink")?));
    }
    for s in &sinks {
        tracing::debug!(sink = s.name(), "sink registered");
    }
    Ok(sinks)
}

/// Human-readable source names for notification text.
pub fn source_display_name(source: &str) -> &str {
    match source {
        "hackernews" => "Hacker News",
        "reddit" => "Reddit",
        "github" => "GitHub",
        "twitter" => "Twitter",
        "devto" => "Dev.to",
        "medium" => "Medium",
        "stackoverflow" => "Stack Overflow",
        "producthunt" => "Product Hunt",
        "lobsters" => "Lobsters",
        "pkggodev" => "pkg.go.dev",
        "google" => "Google",
        other => other,
    }
}

/// One line per mention, for the digest-style sinks.
pub(crate) fn digest_line(m: &Mention) -> String {
    let title = if m.title.is_empty() { m.url.as_str() } else { m.title.as_str() };
    format!("[{}] {} ({})", source_display_name(&m.source), title, m.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::stable_id;
    use anyhow::anyhow;

    fn batch(n: usize) -> Vec<Mention> {
        (1..=n)
            .map(|i| {
                Mention::new(
                    stable_id("t", &i.to_string()),
                    "hackernews",
                    "post",
                    "lazypg",
                    format!("https://x.test/{i}"),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn deliver_each_keeps_going_after_a_failed_item() {
        let items = batch(3);
        let mut seen = Vec::new();
        let report = deliver_each("t", &items, |m| {
            seen.push(m.id.clone());
            let fail = m.id == "t_2";
            async move {
                if fail {
                    Err(anyhow!("boom"))
                } else {
                    Ok(ItemOutcome::Delivered)
                }
            }
        })
        .await;

        assert_eq!(seen, vec!["t_1", "t_2", "t_3"]);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![("t_2".to_string(), "boom".to_string())]);
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Sink for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(DeliveryReport::whole_batch(batch.len()))
        }
    }

    struct Instant1;

    #[async_trait::async_trait]
    impl Sink for Instant1 {
        fn name(&self) -> &'static str {
            "instant"
        }
        async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
            Ok(DeliveryReport::whole_batch(batch.len()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sink_times_out_without_blocking_others() {
        let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(Slow), Arc::new(Instant1)];
        let reports = dispatch(&sinks, &batch(2), Duration::from_secs(1)).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].sink, "slow");
        assert!(reports[0].result.is_err());
        assert!(reports[0].has_failures());
        assert_eq!(reports[1].result.as_ref().unwrap().delivered, 2);
    }

    #[tokio::test]
    async fn empty_batch_dispatches_nothing() {
        let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(Instant1)];
        assert!(dispatch(&sinks, &[], Duration::from_secs(1)).await.is_empty());
    }

    #[test]
    fn no_sinks_without_config() {
        let sinks = sinks_from_config(&SinksConfig::default(), &reqwest::Client::new()).unwrap();
        assert!(sinks.is_empty());
    }
}
