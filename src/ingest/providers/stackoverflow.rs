// src/ingest/providers/stackoverflow.rs
use async_trait::async_trait;
use tokio::time::Instant;

use super::gather;
use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::{contains_keyword, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "stackoverflow";
const BASE_URL: &str = "https://stackoverflow.com";

/// Stack Overflow questions: the tag feed, or the search feed when the tag does not exist.
pub struct StackOverflow {
    client: reqwest::Client,
    base_url: String,
}

impl StackOverflow {
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
        let mut tag_url =
            reqwest::Url::parse(&self.base_url).map_err(|e| SourceError::Other(e.into()))?;
        tag_url
            .path_segments_mut()
            .map_err(|_| SourceError::Parse("base url cannot take a path".into()))?
            .pop_if_empty()
            .extend(["feeds", "tag", keyword]);

        match fetch_feed(&self.client, tag_url.as_str(), deadline).await {
            Ok(items) => Ok(to_mentions(items, keyword, false)),
            Err(SourceError::Status { status, .. }) => {
                tracing::debug!(source = NAME, status, keyword, "tag feed unavailable, using search");
                let search_url = reqwest::Url::parse_with_params(
                    &format!("{}/feeds/search", self.base_url),
                    &[("q", keyword)],
                )
                .map_err(|e| SourceError::Other(e.into()))?;
                let items = fetch_feed(&self.client, search_url.as_str(), deadline).await?;
                Ok(to_mentions(items, keyword, true))
            }
            Err(e) => Err(e),
        }
    }
}

/// Search results are fuzzy, so those get a keyword re-check; tag feeds do not.
fn to_mentions(items: Vec<FeedItem>, keyword: &str, recheck: bool) -> Vec<Mention> {
    let kws = [keyword.to_string()];
    items
        .into_iter()
        .filter(|it| !recheck || contains_keyword(&format!("{} {}", it.title, it.description), &kws).is_some())
        .map(|it| {
            Mention::new(stable_id(NAME, &it.id), NAME, "question", keyword, it.link)
                .title(it.title)
                .content(truncate(&it.description, CONTENT_MAX_CHARS))
                .author(it.author)
                .published_at(it.published)
        })
        .collect()
}

#[async_trait]
impl Source for StackOverflow {
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
