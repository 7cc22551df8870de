// src/ingest/providers/medium.rs
use async_trait::async_trait;
use tokio::time::Instant;

use super::gather;
use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::{contains_keyword, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "medium";
const BASE_URL: &str = "https://medium.com";

/// Medium tag feeds; items are re-checked for the keyword.
pub struct Medium {
    client: reqwest::Client,
    base_url: String,
}

impl Medium {
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
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| SourceError::Other(e.into()))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Parse("base url cannot take a path".into()))?
            .pop_if_empty()
            .extend(["feed", "tag", keyword]);
        let items = fetch_feed(&self.client, url.as_str(), deadline).await?;
        Ok(filter_items(items, keyword))
    }
}

fn filter_items(items: Vec<FeedItem>, keyword: &str) -> Vec<Mention> {
    let kws = [keyword.to_string()];
    items
        .into_iter()
        .filter_map(|it| {
            let text = format!("{} {}", it.title, it.description);
            let matched = contains_keyword(&text, &kws)?;
            Some(
                Mention::new(stable_id(NAME, &it.id), NAME, "article", matched, it.link)
                    .title(it.title)
                    .content(truncate(&it.description, CONTENT_MAX_CHARS))
                    .author(it.author)
                    .published_at(it.published),
            )
        })
        .collect()
}

#[async_trait]
impl Source for Medium {
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
