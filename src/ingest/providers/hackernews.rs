// src/ingest/providers/hackernews.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;

use super::{check_status, gather, parse_json};
use crate::ingest::types::{request_timeout, Source, SourceError};
use crate::ingest::{normalize_text, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "hackernews";
const BASE_URL: &str = "https://hn.algolia.com";
const LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    author: Option<String>,
    story_text: Option<String>,
    comment_text: Option<String>,
    story_title: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

/// Hacker News stories and comments via the Algolia search API.
pub struct HackerNews {
    client: reqwest::Client,
    base_url: String,
}

impl HackerNews {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(
        &self,
        keyword: &str,
        tag: &'static str,
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let endpoint = format!("{}/api/v1/search_by_date", self.base_url);
        let since = (Utc::now() - chrono::Duration::hours(LOOKBACK_HOURS)).timestamp();
        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("query", keyword.to_string()),
                ("tags", tag.to_string()),
                ("numericFilters", format!("created_at_i>{since}")),
            ])
            .timeout(request_timeout(deadline, Duration::from_secs(15))?)
            .send()
            .await?;
        let body = check_status(resp, &endpoint)?.text().await?;
        parse_hits(&body, keyword, tag)
    }
}

fn parse_hits(body: &str, keyword: &str, tag: &str) -> Result<Vec<Mention>, SourceError> {
    let parsed: SearchResponse = parse_json(body)?;
    Ok(parsed
        .hits
        .into_iter()
        .map(|hit| {
            let url = format!("https://news.ycombinator.com/item?id={}", hit.object_id);
            let (kind, title, content) = if tag == "story" {
                ("post", hit.title.unwrap_or_default(), hit.story_text)
            } else {
                (
                    "comment",
                    format!("Comment on: {}", hit.story_title.unwrap_or_default()),
                    hit.comment_text,
                )
            };
            Mention::new(stable_id("hn", &hit.object_id), NAME, kind, keyword, url)
                .title(normalize_text(&title))
                .content(truncate(
                    &normalize_text(content.as_deref().unwrap_or_default()),
                    CONTENT_MAX_CHARS,
                ))
                .author(hit.author.unwrap_or_default())
                .published_at(hit.created_at)
        })
        .collect())
}

#[async_trait]
impl Source for HackerNews {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let mut requests = Vec::with_capacity(keywords.len() * 2);
        for kw in keywords {
            requests.push(self.search(kw, "story", deadline));
            requests.push(self.search(kw, "comment", deadline));
        }
        gather(NAME, requests).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
