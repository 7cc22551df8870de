// src/notify/bark.rs
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Url};

use super::{deliver_each, source_display_name, DeliveryReport, ItemOutcome, Sink};
use crate::config::BarkConfig;
use crate::ingest::truncate;
use crate::mention::Mention;

const GROUP: &str = "mention-monitor";
const BATCH_PREVIEW: usize = 5;

/// One push per mention, or one summary push per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarkMode {
    #[default]
    Each,
    Batch,
}

impl FromStr for BarkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "each" => Ok(Self::Each),
            "batch" => Ok(Self::Batch),
            other => Err(anyhow!("unknown bark mode {other:?} (expected each|batch)")),
        }
    }
}

/// Bark (iOS push) via `GET {server}/{key}/{title}/{body}?url=..&group=..&icon=..`.
pub struct BarkSink {
    client: Client,
    server_url: String,
    device_key: String,
    mode: BarkMode,
    timeout: Duration,
}

impl BarkSink {
    pub fn new(client: Client, cfg: &BarkConfig) -> Self {
        Self {
            client,
            server_url: cfg.server_url.trim_end_matches('/').to_string(),
            device_key: cfg.device_key.clone(),
            mode: cfg.mode,
            timeout: Duration::from_secs(10),
        }
    }

    fn push_url(&self, title: &str, body: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.server_url).context("invalid bark server url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("bark server url cannot carry a path"))?
            .pop_if_empty()
            .extend([self.device_key.as_str(), title, body]);
        for (k, v) in query {
            if !v.is_empty() {
                url.query_pairs_mut().append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn push(&self, url: Url) -> Result<()> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("bark request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("bark returned status {}", status.as_u16());
        }
        Ok(())
    }

    async fn send_one(&self, m: &Mention) -> Result<ItemOutcome> {
        let (title, body) = item_text(m);
        let url = self.push_url(
            &title,
            &body,
            &[("url", &m.url), ("group", GROUP), ("icon", source_icon(&m.source))],
        )?;
        self.push(url).await?;
        Ok(ItemOutcome::Delivered)
    }
}

fn item_text(m: &Mention) -> (String, String) {
    let title = format!("New mention on {}", source_display_name(&m.source));
    let mut body = format!("Title: {}", m.title);
    if !m.author.is_empty() {
        body.push_str(&format!("\nAuthor: {}", m.author));
    }
    (title, body)
}

/// Title and body of the single summary push for several mentions.
fn batch_text(batch: &[Mention]) -> (String, String) {
    let title = format!("{} new mentions", batch.len());
    let mut lines: Vec<String> = batch
        .iter()
        .take(BATCH_PREVIEW)
        .map(|m| format!("• [{}] {}", m.source, truncate(&m.title, 50)))
        .collect();
    if batch.len() > BATCH_PREVIEW {
        lines.push(format!("... and {} more", batch.len() - BATCH_PREVIEW));
    }
    (title, lines.join("\n"))
}

fn source_icon(source: &str) -> &'static str {
    match source {
        "hackernews" => "https://news.ycombinator.com/favicon.ico",
        "reddit" => "https://www.reddit.com/favicon.ico",
        "github" => "https://github.com/favicon.ico",
        "twitter" => "https://twitter.com/favicon.ico",
        "devto" => "https://dev.to/favicon.ico",
        "medium" => "https://medium.com/favicon.ico",
        "stackoverflow" => "https://stackoverflow.com/favicon.ico",
        "producthunt" => "https://www.producthunt.com/favicon.ico",
        "lobsters" => "https://lobste.rs/favicon.ico",
        "pkggodev" => "https://pkg.go.dev/favicon.ico",
        "google" => "https://www.google.com/favicon.ico",
        _ => "",
    }
}

#[async_trait::async_trait]
impl Sink for BarkSink {
    fn name(&self) -> &'static str {
        "bark"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        match (self.mode, batch) {
            (_, []) => Ok(DeliveryReport::default()),
            (BarkMode::Each, _) | (BarkMode::Batch, [_]) => {
                Ok(deliver_each(self.name(), batch, |m| self.send_one(m)).await)
            }
            (BarkMode::Batch, _) => {
                let (title, body) = batch_text(batch);
                let url = self.push_url(&title, &body, &[("group", GROUP)])?;
                self.push(url).await?;
                Ok(DeliveryReport::whole_batch(batch.len()))
            }
        }
    }
}
