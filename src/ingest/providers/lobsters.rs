// src/ingest/providers/lobsters.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;

use super::{check_status, gather, parse_json};
use crate::ingest::types::{request_timeout, Source, SourceError};
use crate::ingest::{contains_keyword, normalize_text, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "lobsters";
const BASE_URL: &str = "https://lobste.rs";

#[derive(Debug, Deserialize)]
struct Story {
    short_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    comments_url: String,
    #[serde(default)]
    submitter_user: SubmitterField,
    created_at: Option<DateTime<Utc>>,
}

/// Older API versions send the submitter as an object, newer ones as a plain name.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum SubmitterField {
    Name(String),
    User {
        username: String,
    },
    #[default]
    Missing,
}

impl SubmitterField {
    fn into_name(self) -> String {
        match self {
            Self::Name(n) | Self::User { username: n } => n,
            Self::Missing => String::new(),
        }
    }
}

/// Lobsters story search, re-checked for the keyword.
pub struct Lobsters {
    client: reqwest::Client,
    base_url: String,
}

impl Lobsters {
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
        let endpoint = format!("{}/search.json", self.base_url);
        let resp = self
            .client
            .get(&endpoint)
            .query(&[("q", keyword), ("what", "stories"), ("order", "newest")])
            .timeout(request_timeout(deadline, Duration::from_secs(15))?)
            .send()
            .await?;
        let body = check_status(resp, &endpoint)?.text().await?;
        parse_stories(&body, keyword)
    }
}

fn parse_stories(body: &str, keyword: &str) -> Result<Vec<Mention>, SourceError> {
    let stories: Vec<Story> = parse_json(body)?;
    let kws = [keyword.to_string()];
    Ok(stories
        .into_iter()
        .filter_map(|s| {
            let description = normalize_text(&s.description);
            let matched = contains_keyword(&format!("{} {}", s.title, description), &kws)?;
            Some(
                Mention::new(stable_id(NAME, &s.short_id), NAME, "post", matched, s.comments_url)
                    .title(normalize_text(&s.title))
                    .content(truncate(&description, CONTENT_MAX_CHARS))
                    .author(s.submitter_user.into_name())
                    .published_at(s.created_at),
            )
        })
        .collect())
}

#[async_trait]
impl Source for Lobsters {
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
