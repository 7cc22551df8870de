// src/ingest/providers/google.rs
use async_trait::async_trait;
use tokio::time::Instant;

use super::gather;
use crate::ingest::feed::{fetch_feed, FeedItem};
use crate::ingest::types::{Source, SourceError};
use crate::ingest::{contains_keyword, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "google";
const NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

/// Google Alerts feeds when configured, otherwise Google News search per keyword.
pub struct Google {
    client: reqwest::Client,
    alert_urls: Vec<String>,
    news_url: String,
}

impl Google {
    pub fn new(client: reqwest::Client, alert_urls: Vec<String>) -> Self {
        Self {
            client,
            alert_urls,
            news_url: NEWS_SEARCH_URL.to_string(),
        }
    }

    pub fn with_news_url(mut self, news_url: impl Into<String>) -> Self {
        self.news_url = news_url.into();
        self
    }

    async fn alert_feed(
        &self,
        feed_url: &str,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let items = fetch_feed(&self.client, feed_url, deadline).await?;
        Ok(items
            .into_iter()
            .map(|it| {
                // An alert feed is already scoped to one query; default attribution to the first keyword.
                let text = format!("{} {}", it.title, it.description);
                let kw = contains_keyword(&text, keywords)
                    .or_else(|| keywords.first().map(String::as_str))
                    .unwrap_or_default()
                    .to_string();
                to_mention(it, &kw, "webpage")
            })
            .collect())
    }

    async fn news_search(&self, keyword: &str, deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        let url = reqwest::Url::parse_with_params(
            &self.news_url,
            &[("q", keyword), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")],
        )
        .map_err(|e| SourceError::Other(e.into()))?;
        let items = fetch_feed(&self.client, url.as_str(), deadline).await?;
        Ok(items
            .into_iter()
            .map(|it| to_mention(it, keyword, "news"))
            .collect())
    }
}

fn to_mention(it: FeedItem, keyword: &str, kind: &str) -> Mention {
    Mention::new(stable_id(NAME, &it.id), NAME, kind, keyword, it.link)
        .title(it.title)
        .content(truncate(&it.description, CONTENT_MAX_CHARS))
        .published_at(it.published)
}

#[async_trait]
impl Source for Google {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        if self.alert_urls.is_empty() {
            let requests = keywords.iter().map(|kw| self.news_search(kw, deadline)).collect();
            return gather(NAME, requests).await;
        }
        let requests = self
            .alert_urls
            .iter()
            .map(|u| self.alert_feed(u, keywords, deadline))
            .collect();
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

    const ALERT_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>tag:google.com,2005:reference:alerts/1</id>
  <title>Google Alert - lazypg</title>
  <entry>
    <id>tag:google.com,2013:googlealerts/feed:111</id>
    <title type="html">A review of &lt;b&gt;terminal&lt;/b&gt; database clients</title>
    <link href="https://www.google.com/url?rct=j&amp;url=https://blog.example/review"/>
    <published>2025-06-10T06:00:00Z</published>
    <content type="html">We tried several tools.</content>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn alert_items_default_to_first_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts/feeds/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ALERT_FEED))
            .mount(&server)
            .await;

        let g = Google::new(
            reqwest::Client::new(),
            vec![format!("{}/alerts/feeds/1", server.uri())],
        );
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let kws = vec!["lazypg".to_string(), "rebelice/lazypg".to_string()];
        let out = g.collect(&kws, deadline).await.unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].keyword, "lazypg");
        assert_eq!(out[0].kind, "webpage");
        assert_eq!(out[0].title, "A review of terminal database clients");
        assert_eq!(out[0].id, "google_tag:google.com,2013:googlealerts/feed:111");
    }
}
