// src/ingest/providers/producthunt.rs
use async_trait::async_trait;
use tokio::time::Instant;

use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::{contains_keyword, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "producthunt";
const FEED_URL: &str = "https://www.producthunt.com/feed";

/// Product Hunt has no keyword search feed: fetch the latest launches once and filter.
pub struct ProductHunt {
    client: reqwest::Client,
    feed_url: String,
}

impl ProductHunt {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            feed_url: FEED_URL.to_string(),
        }
    }

    pub fn with_feed_url(mut self, feed_url: impl Into<String>) -> Self {
        self.feed_url = feed_url.into();
        self
    }
}

fn match_items(items: Vec<FeedItem>, keywords: &[String]) -> Vec<Mention> {
    items
        .into_iter()
        .filter_map(|it| {
            let matched = contains_keyword(&format!("{} {}", it.title, it.description), keywords)?;
            Some(
                Mention::new(stable_id(NAME, &it.id), NAME, "post", matched, it.link)
                    .title(it.title)
                    .content(truncate(&it.description, CONTENT_MAX_CHARS))
                    .author(it.author)
                    .published_at(it.published),
            )
        })
        .collect()
}

#[async_trait]
impl Source for ProductHunt {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let items = fetch_feed(&self.client, &self.feed_url, deadline).await?;
        Ok(match_items(items, keywords))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
