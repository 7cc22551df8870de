// src/ingest/feed.rs
//! RSS 2.0 and Atom parsing shared by the feed-based sources.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::ingest::normalize_text;
use crate::ingest::types::{request_timeout, SourceError};

const FEED_REQUEST_CAP: Duration = Duration::from_secs(20);

/// One entry of either feed flavour, with text already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    /// `guid` (RSS) or `id` (Atom); falls back to the link.
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub author: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Text,
    #[serde(default)]
    link: Text,
    #[serde(default)]
    guid: Text,
    #[serde(rename = "pubDate", default)]
    pub_date: Text,
    #[serde(default)]
    description: Text,
    #[serde(default)]
    author: Text,
    #[serde(rename = "dc:creator", alias = "creator", default)]
    creator: Text,
}

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: Text,
    #[serde(default)]
    title: Text,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Text,
    #[serde(default)]
    content: Text,
    #[serde(default)]
    author: Option<AtomAuthor>,
    #[serde(default)]
    published: Text,
    #[serde(default)]
    updated: Text,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: Text,
}

/// RFC 2822 (RSS `pubDate`) or RFC 3339 (Atom), normalized to UTC.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    // Named zones are common in feeds; the numeric form parses everywhere.
    let numeric = match ts.rsplit_once(' ') {
        Some((head, "GMT" | "UT" | "UTC" | "Z")) => format!("{head} +0000"),
        _ => ts.to_string(),
    };
    let odt = OffsetDateTime::parse(&numeric, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, SourceError> {
    let xml_clean = scrub_html_entities_for_xml(xml);

    // Atom deserializes from anything (all fields default), so RSS goes first.
    if let Ok(rss) = from_str::<Rss>(&xml_clean) {
        return Ok(rss.channel.items.into_iter().map(from_rss).collect());
    }
    let atom: Atom = from_str(&xml_clean)
        .map_err(|e| SourceError::Parse(format!("neither rss nor atom: {e}")))?;
    Ok(atom.entries.into_iter().map(from_atom).collect())
}

fn from_rss(it: RssItem) -> FeedItem {
    let link = it.link.value.trim().to_string();
    let guid = it.guid.value.trim().to_string();
    let author = if it.creator.value.trim().is_empty() {
        it.author.value
    } else {
        it.creator.value
    };
    FeedItem {
        id: if guid.is_empty() { link.clone() } else { guid },
        title: normalize_text(&it.title.value),
        link,
        description: normalize_text(&it.description.value),
        author: normalize_text(&author),
        published: parse_feed_date(&it.pub_date.value),
    }
}

fn from_atom(e: AtomEntry) -> FeedItem {
    let link = e
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.links.first())
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();
    let id = e.id.value.trim().to_string();
    let body = if e.content.value.trim().is_empty() {
        e.summary.value
    } else {
        e.content.value
    };
    let published = parse_feed_date(&e.published.value).or_else(|| parse_feed_date(&e.updated.value));
    FeedItem {
        id: if id.is_empty() { link.clone() } else { id },
        title: normalize_text(&e.title.value),
        link,
        description: normalize_text(&body),
        author: e.author.map(|a| normalize_text(&a.name.value)).unwrap_or_default(),
        published,
    }
}

/// GET a feed and parse it; non-2xx is an error.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    deadline: Instant,
) -> Result<Vec<FeedItem>, SourceError> {
    let resp = client
        .get(url)
        .timeout(request_timeout(deadline, FEED_REQUEST_CAP)?)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            endpoint: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.text().await?;
    parse_feed(&body)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = include_str!("../../tests/fixtures/medium_rss.xml");
    const ATOM: &str = include_str!("../../tests/fixtures/reddit_atom.xml");

    #[test]
    fn parses_rss_items() {
        let items = parse_feed(RSS).expect("rss parses");
        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first.id, "https://medium.com/p/abc123");
        assert_eq!(first.title, "Why I switched to lazypg");
        assert_eq!(first.author, "Jane Doe");
        assert!(first.description.starts_with("A terminal UI"));
        assert!(first.published.is_some());
    }

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM).expect("atom parses");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "t3_1abcde");
        assert_eq!(
            items[0].link,
            "https://www.reddit.com/r/PostgreSQL/comments/1abcde/lazypg/"
        );
        assert_eq!(items[0].author, "/u/pgfan");
        assert!(items[0].published.is_some());
    }

    #[test]
    fn feed_dates_accept_both_formats() {
        let a = parse_feed_date("Tue, 10 Jun 2025 14:00:00 +0200").unwrap();
        assert_eq!(a.to_rfc3339(), "2025-06-10T12:00:00+00:00");
        let b = parse_feed_date("2025-06-10T12:00:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_feed_date("yesterday").is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_feed("<html"), Err(SourceError::Parse(_))));
    }
}
