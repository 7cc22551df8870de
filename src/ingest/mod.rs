// src/ingest/mod.rs
pub mod config;
pub mod feed;
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use tokio::time::Instant;

use crate::ingest::types::{Source, SourceError};
use crate::mention::Mention;

/// Cap for `content` fields after normalization.
pub const CONTENT_MAX_CHARS: usize = 500;

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Tags can hide a second round of entities (`&amp;lt;`)
    out = html_escape::decode_html_entities(&out).to_string();

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cut to `max_chars` characters, marking the cut with "...".
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// First keyword (in list order) contained in `text`, case-insensitively.
pub fn contains_keyword<'k>(text: &str, keywords: &'k [String]) -> Option<&'k str> {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .find(|kw| !kw.is_empty() && lower.contains(&kw.to_lowercase()))
        .map(String::as_str)
}

/// What one source contributed to a round.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: &'static str,
    pub elapsed: Duration,
    /// Accepted candidate count, or the error text.
    pub result: Result<usize, String>,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct Aggregation {
    /// Registration order of sources, then each source's own order.
    pub candidates: Vec<Mention>,
    pub outcomes: Vec<SourceOutcome>,
    pub malformed: usize,
}

impl Aggregation {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }
}

/// Runs every registered source against the same keywords and deadline.
pub struct Aggregator {
    sources: Vec<Arc<dyn Source>>,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn Source>>, concurrency: usize) -> Self {
        Self {
            sources,
            concurrency: concurrency.max(1),
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Collect from all sources. Never fails: a failing or late source contributes nothing.
    pub async fn collect_all(
        &self,
        keywords: &[String],
        deadline: Instant,
        discovered_at: DateTime<Utc>,
    ) -> Aggregation {
        crate::metrics::ensure_described();

        let results: Vec<_> = stream::iter(self.sources.iter().map(|src| async move {
            let t0 = std::time::Instant::now();
            let res = match tokio::time::timeout_at(deadline, src.collect(keywords, deadline)).await
            {
                Ok(r) => r,
                Err(_) => Err(SourceError::Timeout),
            };
            (src.name(), t0.elapsed(), res)
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut agg = Aggregation::default();
        for (name, elapsed, res) in results {
            histogram!("monitor_source_duration_ms", "source" => name)
                .record(elapsed.as_secs_f64() * 1_000.0);

            let result = match res {
                Ok(found) => {
                    let mut accepted = 0usize;
                    for mut m in found {
                        if let Some(reason) = m.validation_error() {
                            tracing::warn!(source = name, id = %m.id, url = %m.url, reason, "dropping malformed candidate");
                            agg.malformed += 1;
                            continue;
                        }
                        m.discovered_at = discovered_at;
                        agg.candidates.push(m);
                        accepted += 1;
                    }
                    tracing::info!(source = name, found = accepted, ms = elapsed.as_millis() as u64, "source collected");
                    Ok(accepted)
                }
                Err(e) => {
                    tracing::warn!(error = %e, source = name, "source failed");
                    counter!("monitor_source_errors_total", "source" => name).increment(1);
                    Err(e.to_string())
                }
            };
            agg.outcomes.push(SourceOutcome {
                source: name,
                elapsed,
                result,
            });
        }

        counter!("monitor_candidates_total").increment(agg.candidates.len() as u64);
        counter!("monitor_malformed_total").increment(agg.malformed as u64);
        agg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>\n&amp;lt;3 ";
        assert_eq!(normalize_text(s), "Hello, world <3");
    }

    #[test]
    fn truncate_marks_cut_and_respects_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        // multi-byte characters are counted, not bytes
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn keyword_match_is_case_insensitive_and_ordered() {
        let kws = vec!["lazypg".to_string(), "rebelice/lazypg".to_string()];
        assert_eq!(
            contains_keyword("Check out rebelice/LazyPG", &kws),
            Some("lazypg")
        );
        assert_eq!(contains_keyword("nothing here", &kws), None);
        assert_eq!(contains_keyword("anything", &[String::new()]), None);
    }
}
