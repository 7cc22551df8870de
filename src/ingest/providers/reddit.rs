// src/ingest/providers/reddit.rs
use async_trait::async_trait;
use tokio::time::Instant;

use super::gather;
use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::{truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "reddit";
const BASE_URL: &str = "https://www.reddit.com";

/// Reddit posts and comments from the search feed (Atom).
pub struct Reddit {
    client: reqwest::Client,
    base_url: String,
}

impl Reddit {
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
        kind: &'static str,
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let mut url = reqwest::Url::parse(&format!("{}/search.rss", self.base_url))
            .map_err(|e| SourceError::Other(e.into()))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("q", keyword)
                .append_pair("sort", "new")
                .append_pair("t", "day");
            if kind == "comment" {
                q.append_pair("type", "comment");
            }
        }
        let items = fetch_feed(&self.client, url.as_str(), deadline).await?;
        Ok(items
            .into_iter()
            .map(|it| to_mention(it, keyword, kind))
            .collect())
    }
}

fn to_mention(it: FeedItem, keyword: &str, kind: &str) -> Mention {
    Mention::new(stable_id(NAME, &it.id), NAME, kind, keyword, it.link)
        .title(it.title)
        .content(truncate(&it.description, CONTENT_MAX_CHARS))
        .author(it.author)
        .published_at(it.published)
}

#[async_trait]
impl Source for Reddit {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let mut requests = Vec::with_capacity(keywords.len() * 2);
        for kw in keywords {
            requests.push(self.search(kw, "post", deadline));
            requests.push(self.search(kw, "comment", deadline));
        }
        gather(NAME, requests).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
