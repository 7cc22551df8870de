use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{digest_line, DeliveryReport, Sink};
use crate::mention::Mention;

/// Discord caps embed descriptions at 4096 characters.
const DESCRIPTION_LIMIT: usize = 4000;

#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordSink {
    pub fn new(client: Client, webhook: String) -> Self {
        Self {
            webhook,
            client,
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post_with_retry(&self, payload: &DiscordWebhookPayload) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, "discord retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn digest(batch: &[Mention]) -> Self {
        let mut description = String::new();
        let mut shown = 0usize;
        for m in batch {
            let line = format!("• {}\n", digest_line(m));
            if description.len() + line.len() > DESCRIPTION_LIMIT {
                break;
            }
            description.push_str(&line);
            shown += 1;
        }
        if shown < batch.len() {
            description.push_str(&format!("… and {} more", batch.len() - shown));
        }
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: format!("{} new mention(s)", batch.len()),
                description: description.trim_end().to_string(),
            }],
        }
    }
}

#[async_trait::async_trait]
impl Sink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        self.post_with_retry(&DiscordWebhookPayload::digest(batch)).await?;
        Ok(DeliveryReport::whole_batch(batch.len()))
    }
}
