// src/config.rs
//! Process configuration, read from the environment (and an optional keywords file).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::ingest::config::{load_keywords_from, split_list};
use crate::notify::bark::BarkMode;
use crate::runner::RunSettings;

pub const DEFAULT_KEYWORDS: &[&str] = &["lazypg", "rebelice/lazypg"];
pub const DEFAULT_STATE_PATH: &str = "data/mentions.json";
pub const DEFAULT_BARK_SERVER: &str = "https://api.day.app";

/// Per-source credentials and endpoints. Nothing here disables a source except `disabled`.
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    /// Enables authenticated GitHub search (code search included).
    pub github_token: Option<String>,
    /// Google Alerts RSS feeds; empty means Google News search.
    pub google_alert_urls: Vec<String>,
    /// Empty means the built-in instance list.
    pub nitter_instances: Vec<String>,
    /// Source names to skip, case-insensitive.
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BarkConfig {
    pub device_key: String,
    pub server_url: String,
    pub mode: BarkMode,
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
    pub to: String,
}

/// A sink is registered only when its section is present.
#[derive(Debug, Clone, Default)]
pub struct SinksConfig {
    pub database_url: Option<String>,
    pub mongodb_uri: Option<String>,
    pub bark: Option<BarkConfig>,
    pub notion: Option<NotionConfig>,
    pub slack_webhook: Option<String>,
    pub discord_webhook: Option<String>,
    pub email: Option<EmailConfig>,
}

impl SinksConfig {
    pub fn is_empty(&self) -> bool {
        self.database_url.is_none()
            && self.mongodb_uri.is_none()
            && self.bark.is_none()
            && self.notion.is_none()
            && self.slack_webhook.is_none()
            && self.discord_webhook.is_none()
            && self.email.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Non-empty, ordered; order decides keyword attribution.
    pub keywords: Vec<String>,
    pub state_path: PathBuf,
    pub run: RunSettings,
    pub sources: SourcesConfig,
    pub sinks: SinksConfig,
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            run: RunSettings::default(),
            sources: SourcesConfig::default(),
            sinks: SinksConfig::default(),
            metrics_textfile: None,
        }
    }
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut keywords = match get("KEYWORDS_PATH") {
            Some(p) => load_keywords_from(Path::new(&p))?,
            None => get("KEYWORDS").map(|raw| split_list(&raw)).unwrap_or_default(),
        };
        if keywords.is_empty() {
            keywords = default_keywords();
        }

        let defaults = RunSettings::default();
        let run = RunSettings {
            run_timeout: Duration::from_secs(positive(&get, "RUN_TIMEOUT_SECS", defaults.run_timeout.as_secs())?),
            source_concurrency: positive(&get, "SOURCE_CONCURRENCY", defaults.source_concurrency)?,
            sink_timeout: Duration::from_secs(positive(&get, "SINK_TIMEOUT_SECS", defaults.sink_timeout.as_secs())?),
        };

        let sources = SourcesConfig {
            github_token: get("GITHUB_TOKEN"),
            google_alert_urls: get("GOOGLE_ALERT_URLS").map(|v| split_list(&v)).unwrap_or_default(),
            nitter_instances: get("NITTER_INSTANCES").map(|v| split_list(&v)).unwrap_or_default(),
            disabled: get("DISABLED_SOURCES").map(|v| split_list(&v)).unwrap_or_default(),
        };

        let bark = match get("BARK_DEVICE_KEY") {
            Some(device_key) => Some(BarkConfig {
                device_key,
                server_url: get("BARK_SERVER_URL")
                    .unwrap_or_else(|| DEFAULT_BARK_SERVER.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                mode: match get("BARK_MODE") {
                    Some(m) => m.parse().with_context(|| "BARK_MODE")?,
                    None => BarkMode::Each,
                },
            }),
            None => None,
        };

        let notion = match (get("NOTION_TOKEN"), get("NOTION_DATABASE_ID")) {
            (Some(token), Some(database_id)) => Some(NotionConfig { token, database_id }),
            (None, None) => None,
            _ => {
                tracing::warn!("notion sink needs both NOTION_TOKEN and NOTION_DATABASE_ID; not registered");
                None
            }
        };

        let email_parts = [
            "SMTP_HOST",
            "SMTP_USER",
            "SMTP_PASS",
            "NOTIFY_EMAIL_FROM",
            "NOTIFY_EMAIL_TO",
        ]
        .map(|k| get(k));
        let email = match email_parts {
            [Some(smtp_host), Some(smtp_user), Some(smtp_pass), Some(from), Some(to)] => {
                Some(EmailConfig {
                    smtp_host,
                    smtp_user,
                    smtp_pass,
                    from,
                    to,
                })
            }
            ref parts if parts.iter().all(Option::is_none) => None,
            _ => {
                tracing::warn!("email sink needs SMTP_HOST, SMTP_USER, SMTP_PASS, NOTIFY_EMAIL_FROM and NOTIFY_EMAIL_TO; not registered");
                None
            }
        };

        let sinks = SinksConfig {
            database_url: get("DATABASE_URL"),
            mongodb_uri: get("MONGODB_URI"),
            bark,
            notion,
            slack_webhook: get("SLACK_WEBHOOK_URL"),
            discord_webhook: get("DISCORD_WEBHOOK_URL"),
            email,
        };

        Ok(Self {
            keywords,
            state_path: get("MENTIONS_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            run,
            sources,
            sinks,
            metrics_textfile: get("METRICS_TEXTFILE_PATH").map(PathBuf::from),
        })
    }
}

/// Parse a strictly positive number, falling back to `default` when unset.
fn positive<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    let v: T = raw
        .parse()
        .map_err(|e| anyhow!("{key}={raw:?} is not a valid number: {e}"))?;
    if v == T::default() {
        bail!("{key} must be greater than zero");
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<MonitorConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.keywords, vec!["lazypg", "rebelice/lazypg"]);
        assert_eq!(c.state_path, PathBuf::from("data/mentions.json"));
        assert_eq!(c.run.run_timeout, Duration::from_secs(300));
        assert_eq!(c.run.source_concurrency, 4);
        assert_eq!(c.run.sink_timeout, Duration::from_secs(60));
        assert!(c.sinks.is_empty());
        assert!(c.sources.github_token.is_none());
    }

    #[test]
    fn keyword_list_keeps_order_and_falls_back_when_blank() {
        let c = cfg(&[("KEYWORDS", " beta, alpha ,beta,")]).unwrap();
        assert_eq!(c.keywords, vec!["beta", "alpha"]);
        let c = cfg(&[("KEYWORDS", " , ")]).unwrap();
        assert_eq!(c.keywords, vec!["lazypg", "rebelice/lazypg"]);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        assert!(cfg(&[("RUN_TIMEOUT_SECS", "soon")]).is_err());
        assert!(cfg(&[("SOURCE_CONCURRENCY", "0")]).is_err());
        assert!(cfg(&[("SINK_TIMEOUT_SECS", "-5")]).is_err());
        let c = cfg(&[("SOURCE_CONCURRENCY", "8")]).unwrap();
        assert_eq!(c.run.source_concurrency, 8);
    }

    #[test]
    fn sinks_register_only_when_complete() {
        let c = cfg(&[
            ("BARK_DEVICE_KEY", "abc"),
            ("BARK_MODE", "Batch"),
            ("NOTION_TOKEN", "secret"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SLACK_WEBHOOK_URL", "https://hooks.slack.test/x"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
        ])
        .unwrap();
        let bark = c.sinks.bark.expect("bark configured");
        assert_eq!(bark.mode, BarkMode::Batch);
        assert_eq!(bark.server_url, "https://api.day.app");
        assert!(c.sinks.notion.is_none());
        assert!(c.sinks.email.is_none());
        assert!(c.sinks.slack_webhook.is_some());
        assert_eq!(c.sinks.mongodb_uri.as_deref(), Some("mongodb://localhost:27017"));

        assert!(cfg(&[("BARK_DEVICE_KEY", "abc"), ("BARK_MODE", "sometimes")]).is_err());
    }

    #[test]
    fn source_lists_are_split() {
        let c = cfg(&[
            ("DISABLED_SOURCES", "twitter, pkggodev"),
            ("GOOGLE_ALERT_URLS", "https://www.google.com/alerts/feeds/1/2"),
            ("GITHUB_TOKEN", "  "),
        ])
        .unwrap();
        assert_eq!(c.sources.disabled, vec!["twitter", "pkggodev"]);
        assert_eq!(c.sources.google_alert_urls.len(), 1);
        assert!(c.sources.github_token.is_none());
    }
}
