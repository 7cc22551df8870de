// src/notify/notion.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{deliver_each, DeliveryReport, ItemOutcome, Sink};
use crate::config::NotionConfig;
use crate::ingest::truncate;
use crate::mention::Mention;

const API_BASE: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
/// Notion rejects rich text longer than this.
const TEXT_LIMIT: usize = 2000;

/// One page per mention in a Notion database.
pub struct NotionSink {
    client: Client,
    token: String,
    database_id: String,
    api_base: String,
    check_duplicate: bool,
    timeout: Duration,
}

impl NotionSink {
    pub fn new(client: Client, cfg: &NotionConfig) -> Self {
        Self {
            client,
            token: cfg.token.clone(),
            database_id: cfg.database_id.clone(),
            api_base: API_BASE.to_string(),
            check_duplicate: true,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Query the database by URL before creating a page.
    pub fn with_duplicate_check(mut self, on: bool) -> Self {
        self.check_duplicate = on;
        self
    }

    fn post(&self, path: &str, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(self.timeout)
            .json(body)
    }

    /// Whether a page with this URL already exists. Lookup failures count as "no".
    async fn exists(&self, url: &str) -> bool {
        #[derive(Deserialize)]
        struct QueryResult {
            #[serde(default)]
            results: Vec<Value>,
        }
        let body = json!({ "filter": { "property": "URL", "url": { "equals": url } } });
        let path = format!("/v1/databases/{}/query", self.database_id);
        let res = async {
            let resp = self.post(&path, &body).send().await?.error_for_status()?;
            resp.json::<QueryResult>().await
        }
        .await;
        match res {
            Ok(r) => !r.results.is_empty(),
            Err(e) => {
                tracing::debug!(error = %e, "notion duplicate check failed");
                false
            }
        }
    }

    async fn create_page(&self, m: &Mention) -> Result<ItemOutcome> {
        if self.check_duplicate && self.exists(&m.url).await {
            return Ok(ItemOutcome::AlreadyPresent);
        }
        let resp = self
            .post("/v1/pages", &page_body(&self.database_id, m))
            .send()
            .await
            .context("notion request")?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("notion API error {}: {}", status.as_u16(), truncate(&detail, 200));
        }
        Ok(ItemOutcome::Delivered)
    }
}

fn rich_text(s: &str) -> Value {
    json!([{ "text": { "content": truncate(s, TEXT_LIMIT) } }])
}

fn page_body(database_id: &str, m: &Mention) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Title": { "title": rich_text(&m.title) },
            "Source": { "select": { "name": m.source } },
            "Type": { "select": { "name": m.kind } },
            "URL": { "url": m.url },
            "Author": { "rich_text": rich_text(&m.author) },
            "Content": { "rich_text": rich_text(&m.content) },
            "Keyword": { "select": { "name": m.keyword } },
            "Discovered": { "date": { "start": m.discovered_at.to_rfc3339() } },
            "Status": { "select": { "name": "unread" } },
        }
    })
}

#[async_trait::async_trait]
impl Sink for NotionSink {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        Ok(deliver_each(self.name(), batch, |m| self.create_page(m)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::stable_id;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mention(i: usize) -> Mention {
        Mention::new(
            stable_id("reddit", &format!("t3_{i}")),
            "reddit",
            "post",
            "lazypg",
            format!("https://www.reddit.com/r/x/comments/{i}/"),
        )
        .title("Anyone using lazypg?")
    }

    #[test]
    fn page_body_maps_fields() {
        let body = page_body("db1", &mention(1));
        assert_eq!(body["parent"]["database_id"], "db1");
        assert_eq!(body["properties"]["Type"]["select"]["name"], "post");
        assert_eq!(
            body["properties"]["Title"]["title"][0]["text"]["content"],
            "Anyone using lazypg?"
        );
        assert_eq!(body["properties"]["Status"]["select"]["name"], "unread");
    }

    #[tokio::test]
    async fn existing_url_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/databases/db1/query"))
            .and(body_partial_json(json!({ "filter": { "url": { "equals": "https://www.reddit.com/r/x/comments/1/" } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "id": "p" }] })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/databases/db1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pages"))
            .and(header("Notion-Version", NOTION_VERSION))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new" })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = NotionSink::new(
            Client::new(),
            &NotionConfig {
                token: "secret".into(),
                database_id: "db1".into(),
            },
        )
        .with_api_base(server.uri());
        let report = sink.send(&[mention(1), mention(2)]).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 1);
        assert!(report.is_clean());
    }
}
