use anyhow::{Context, Result};
use reqwest::Client;

use super::{digest_line, DeliveryReport, Sink};
use crate::mention::Mention;

/// Lines per message; the rest is summarized.
const MAX_LINES: usize = 20;

pub struct SlackSink {
    webhook_url: String,
    client: Client,
}

impl SlackSink {
    pub fn new(client: Client, webhook_url: String) -> Self {
        Self {
            webhook_url,
            client,
        }
    }
}

fn digest_text(batch: &[Mention]) -> String {
    let mut text = format!("*{} new mention(s)*", batch.len());
    for m in batch.iter().take(MAX_LINES) {
        text.push_str("\n• ");
        text.push_str(&digest_line(m));
    }
    if batch.len() > MAX_LINES {
        text.push_str(&format!("\n… and {} more", batch.len() - MAX_LINES));
    }
    text
}

#[async_trait::async_trait]
impl Sink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        let body = serde_json::json!({ "text": digest_text(batch) });

        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(DeliveryReport::whole_batch(batch.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::stable_id;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_one_digest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let batch = vec![
            Mention::new(stable_id("hn", "1"), "hackernews", "post", "lazypg", "https://x.test/1")
                .title("Show HN: lazypg"),
        ];
        let sink = SlackSink::new(Client::new(), format!("{}/hook", server.uri()));
        let report = sink.send(&batch).await.unwrap();
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn webhook_error_fails_the_sink() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let sink = SlackSink::new(Client::new(), server.uri());
        let batch = vec![Mention::new(stable_id("hn", "1"), "hackernews", "post", "k", "https://x.test/1")];
        assert!(sink.send(&batch).await.is_err());
    }

    #[test]
    fn long_batches_are_summarized() {
        let batch: Vec<_> = (0..25)
            .map(|i| Mention::new(stable_id("hn", &i.to_string()), "hackernews", "post", "k", "https://x.test"))
            .collect();
        let text = digest_text(&batch);
        assert!(text.starts_with("*25 new mention(s)*"));
        assert!(text.ends_with("… and 5 more"));
        assert!(text.contains("[Hacker News] https://x.test (https://x.test)"));
    }
}
