// src/ingest/providers/devto.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;

use super::{check_status, gather, parse_json};
use crate::ingest::types::{request_timeout, Source, SourceError};
use crate::ingest::{contains_keyword, normalize_text, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "devto";
const BASE_URL: &str = "https://dev.to";

#[derive(Debug, Deserialize)]
struct Article {
    id: u64,
    #[serde(default)]
    title: String,
    description: Option<String>,
    #[serde(default)]
    url: String,
    user: Option<User>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: String,
}

/// Dev.to articles by tag, re-checked for the keyword in title or description.
pub struct DevTo {
    client: reqwest::Client,
    base_url: String,
}

impl DevTo {
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

    async fn search(&self, keyword: &str, deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        let endpoint = format!("{}/api/articles", self.base_url);
        let resp = self
            .client
            .get(&endpoint)
            .query(&[("tag", keyword), ("per_page", "30")])
            .timeout(request_timeout(deadline, Duration::from_secs(15))?)
            .send()
            .await?;
        let body = check_status(resp, &endpoint)?.text().await?;
        parse_articles(&body, keyword)
    }
}

fn parse_articles(body: &str, keyword: &str) -> Result<Vec<Mention>, SourceError> {
    let articles: Vec<Article> = parse_json(body)?;
    let kws = [keyword.to_string()];
    Ok(articles
        .into_iter()
        .filter_map(|a| {
            let description = normalize_text(a.description.as_deref().unwrap_or_default());
            let matched = contains_keyword(&format!("{} {}", a.title, description), &kws)?;
            Some(
                Mention::new(stable_id(NAME, &a.id.to_string()), NAME, "article", matched, a.url)
                    .title(normalize_text(&a.title))
                    .content(truncate(&description, CONTENT_MAX_CHARS))
                    .author(a.user.map(|u| u.username).unwrap_or_default())
                    .published_at(a.created_at),
            )
        })
        .collect())
}

#[async_trait]
impl Source for DevTo {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let requests = keywords.iter().map(|kw| self.search(kw, deadline)).collect();
        gather(NAME, requests).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articles_without_the_keyword_are_dropped() {
        let body = r#"[
            {"id": 1901, "title": "Meet lazypg", "description": "TUI for Postgres",
             "url": "https://dev.to/a/meet-lazypg", "user": {"username": "a"},
             "created_at": "2025-06-09T10:00:00Z"},
            {"id": 1902, "title": "Other", "description": null, "url": "https://dev.to/b/other"}
        ]"#;
        let out = parse_articles(body, "lazypg").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "devto_1901");
        assert_eq!(out[0].author, "a");
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        assert!(matches!(
            parse_articles(r#"{"error":"rate limited"}"#, "x"),
            Err(SourceError::Parse(_))
        ));
    }
}
