// src/ingest/providers/twitter.rs
use async_trait::async_trait;
use tokio::time::Instant;

use super::gather;
use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::truncate;
use crate::mention::{stable_id, Mention};

const NAME: &str = "twitter";

pub const DEFAULT_NITTER_INSTANCES: &[&str] = &[
    "nitter.privacydev.net",
    "nitter.poast.org",
    "nitter.woodland.cafe",
];

/// Tweets via Nitter search feeds. Instances are tried in order until one answers.
pub struct Twitter {
    client: reqwest::Client,
    instances: Vec<String>,
    scheme: &'static str,
}

impl Twitter {
    pub fn new(client: reqwest::Client, instances: Vec<String>) -> Self {
        let instances = if instances.is_empty() {
            DEFAULT_NITTER_INSTANCES.iter().map(|s| s.to_string()).collect()
        } else {
            instances
        };
        Self {
            client,
            instances,
            scheme: "https",
        }
    }

    /// Plain-http instances (local mirrors, tests).
    pub fn insecure(mut self) -> Self {
        self.scheme = "http";
        self
    }

    async fn search(&self, keyword: &str, deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        let mut last_err = None;
        for instance in &self.instances {
            let url = reqwest::Url::parse_with_params(
                &format!("{}://{}/search/rss", self.scheme, instance),
                &[("f", "tweets"), ("q", keyword)],
            )
            .map_err(|e| SourceError::Other(e.into()))?;
            match fetch_feed(&self.client, url.as_str(), deadline).await {
                Ok(items) => return Ok(items.into_iter().map(|it| to_mention(it, keyword)).collect()),
                Err(SourceError::Timeout) => return Err(SourceError::Timeout),
                Err(e) => {
                    tracing::debug!(source = NAME, instance = %instance, error = %e, "nitter instance failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SourceError::Parse("no nitter instances configured".into())))
    }
}

fn to_mention(it: FeedItem, keyword: &str) -> Mention {
    Mention::new(stable_id(NAME, &it.id), NAME, "post", keyword, to_twitter_url(&it.link))
        .title(truncate(&it.title, 100))
        .content(it.description)
        .author(it.author)
        .published_at(it.published)
}

/// Point Nitter links back at twitter.com; unparsable links pass through.
pub fn to_twitter_url(nitter_url: &str) -> String {
    match reqwest::Url::parse(nitter_url) {
        Ok(mut u) => {
            if u.set_host(Some("twitter.com")).is_err() {
                return nitter_url.to_string();
            }
            let _ = u.set_scheme("https");
            let _ = u.set_port(None);
            u.to_string()
        }
        Err(_) => nitter_url.to_string(),
    }
}

#[async_trait]
impl Source for Twitter {
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn nitter_links_are_rewritten() {
        assert_eq!(
            to_twitter_url("https://nitter.poast.org/someone/status/123#m"),
            "https://twitter.com/someone/status/123#m"
        );
        assert_eq!(to_twitter_url("not a url"), "not a url");
    }

    #[tokio::test]
    async fn falls_through_to_next_instance() {
        let dead = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&dead)
            .await;
        let live = MockServer::start().await;
        let rss = r#"<rss version="2.0"><channel><item>
            <title>loving lazypg today</title>
            <link>http://nitter.local/dev/status/99#m</link>
            <guid>http://nitter.local/dev/status/99#m</guid>
            <dc:creator>@dev</dc:creator>
            <description>loving lazypg today</description>
        </item></channel></rss>"#;
        Mock::given(method("GET"))
            .and(path("/search/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .mount(&live)
            .await;

        let host = |s: &MockServer| s.uri().trim_start_matches("http://").to_string();
        let tw = Twitter::new(reqwest::Client::new(), vec![host(&dead), host(&live)]).insecure();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let out = tw.collect(&["lazypg".to_string()], deadline).await.unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://twitter.com/dev/status/99#m");
        assert_eq!(out[0].author, "@dev");
    }
}
