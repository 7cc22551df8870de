//! # Mention & RunState
//! The unit of discovered content and the persisted append-only log of it.
//!
//! Wire shape matches the `data/mentions.json` record:
//! `{ "last_updated": <rfc3339>, "mentions": [ { "id", "source", "type", ... } ] }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Native identifiers longer than this are hashed so ids stay usable as keys.
const MAX_NATIVE_ID_LEN: usize = 160;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mention {
    /// `<prefix>_<native id>`; sole dedup key.
    pub id: String,
    pub source: String, // e.g. "hackernews", "reddit"
    #[serde(rename = "type")]
    pub kind: String, // post | comment | issue | article | ...
    pub keyword: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub author: String,
    /// Stamped by the aggregator, never by a source.
    #[serde(default)]
    pub discovered_at: DateTime<Utc>,
    #[serde(default, with = "zero_time", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Mention {
    /// Starts a candidate with the required fields; display fields are filled by the caller.
    /// `id` should come from [`stable_id`].
    pub fn new(
        id: String,
        source: &str,
        kind: &str,
        keyword: &str,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source: source.to_string(),
            kind: kind.to_string(),
            keyword: keyword.to_string(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn published_at(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.published_at = ts;
        self
    }

    /// Why a candidate cannot be accepted, if it can't.
    pub fn validation_error(&self) -> Option<&'static str> {
        if self.id.trim().is_empty() {
            Some("empty id")
        } else if self.url.trim().is_empty() {
            Some("empty url")
        } else {
            None
        }
    }
}

/// Deterministic id for `(prefix, native id)`, e.g. `hn_41000001`.
///
/// An empty native id yields an empty mention id, which validation later rejects.
pub fn stable_id(prefix: &str, native_id: &str) -> String {
    let native = native_id.trim();
    if native.is_empty() {
        return String::new();
    }
    if native.len() <= MAX_NATIVE_ID_LEN {
        return format!("{prefix}_{native}");
    }
    let digest = Sha256::digest(native.as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    format!("{prefix}_{hex}")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    #[serde(default, with = "zero_time", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl RunState {
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }
}

/// Optional timestamps. The year-1 "zero time" written by older state files reads as absent.
mod zero_time {
    use chrono::{DateTime, Datelike, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(ts) => s.serialize_str(&ts.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let v: Option<DateTime<Utc>> = Option::deserialize(d)?;
        Ok(v.filter(|ts| ts.year() > 1))
    }
}
