// src/ingest/providers/mod.rs
pub mod devto;
pub mod github;
pub mod google;
pub mod hackernews;
pub mod lobsters;
pub mod medium;
pub mod pkggodev;
pub mod producthunt;
pub mod reddit;
pub mod stackoverflow;
pub mod twitter;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SourcesConfig;
use crate::ingest::types::{Source, SourceError};
use crate::mention::Mention;
#[cfg(test)]
use crate::mention::stable_id;

pub const USER_AGENT: &str = "mention-monitor/1.0";

/// Shared client for all sources; per-request timeouts come from the run deadline.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("building source http client")
}

/// Every known source, minus the ones disabled in config.
pub fn default_sources(cfg: &SourcesConfig, client: &reqwest::Client) -> Vec<Arc<dyn Source>> {
    let all: Vec<Arc<dyn Source>> = vec![
        Arc::new(hackernews::HackerNews::new(client.clone())),
        Arc::new(reddit::Reddit::new(client.clone())),
        Arc::new(github::GitHub::new(client.clone(), cfg.github_token.clone())),
        Arc::new(twitter::Twitter::new(
            client.clone(),
            cfg.nitter_instances.clone(),
        )),
        Arc::new(devto::DevTo::new(client.clone())),
        Arc::new(medium::Medium::new(client.clone())),
        Arc::new(stackoverflow::StackOverflow::new(client.clone())),
        Arc::new(producthunt::ProductHunt::new(client.clone())),
        Arc::new(lobsters::Lobsters::new(client.clone())),
        Arc::new(pkggodev::PkgGoDev::new(client.clone())),
        Arc::new(google::Google::new(
            client.clone(),
            cfg.google_alert_urls.clone(),
        )),
    ];
    all.into_iter()
        .filter(|s| {
            let off = cfg.disabled.iter().any(|d| d.eq_ignore_ascii_case(s.name()));
            if off {
                tracing::debug!(source = s.name(), "source disabled by config");
            }
            !off
        })
        .collect()
}

/// Await sub-requests one after another (keeps request rate polite).
///
/// A failing sub-request is logged and skipped. The source only fails when every
/// sub-request failed.
pub(crate) async fn gather<Fut>(
    source: &'static str,
    requests: Vec<Fut>,
) -> Result<Vec<Mention>, SourceError>
where
    Fut: Future<Output = Result<Vec<Mention>, SourceError>>,
{
    let total = requests.len();
    let mut out = Vec::new();
    let mut last_err = None;
    let mut ok = 0usize;
    for req in requests {
        match req.await {
            Ok(mut v) => {
                ok += 1;
                out.append(&mut v);
            }
            Err(SourceError::Timeout) => return Err(SourceError::Timeout),
            Err(e) => {
                tracing::debug!(source, error = %e, "sub-request failed");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if ok == 0 && total > 0 => Err(e),
        Some(e) => {
            tracing::warn!(source, failed = total - ok, total, error = %e, "partial source failure");
            Ok(out)
        }
        None => Ok(out),
    }
}

/// Non-2xx → `SourceError::Status`.
pub(crate) fn check_status(
    resp: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(SourceError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    type Req = Pin<Box<dyn Future<Output = Result<Vec<Mention>, SourceError>>>>;

    fn ok(ids: &[&str]) -> Result<Vec<Mention>, SourceError> {
        Ok(ids
            .iter()
            .map(|id| Mention::new(stable_id("t", id), "t", "post", "k", "https://x.test"))
            .collect())
    }

    #[tokio::test]
    async fn gather_tolerates_partial_failure() {
        let reqs = vec![
            Box::pin(async { ok(&["1"]) }) as Req,
            Box::pin(async { Err::<Vec<Mention>, _>(SourceError::Parse("bad".into())) }),
            Box::pin(async { ok(&["2", "3"]) }),
        ];
        let out = gather("t", reqs).await.unwrap();
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["t_1", "t_2", "t_3"]);
    }

    #[tokio::test]
    async fn gather_fails_when_everything_failed() {
        let reqs = vec![
            Box::pin(async { Err::<Vec<Mention>, _>(SourceError::Parse("a".into())) }) as Req,
            Box::pin(async { Err::<Vec<Mention>, _>(SourceError::Parse("b".into())) }),
        ];
        assert!(gather("t", reqs).await.is_err());
        let none: Vec<std::future::Ready<Result<Vec<Mention>, SourceError>>> = vec![];
        assert!(gather("t", none).await.unwrap().is_empty());
    }

    #[test]
    fn disabled_sources_are_filtered() {
        let cfg = SourcesConfig {
            disabled: vec!["Twitter".into(), "pkggodev".into()],
            ..SourcesConfig::default()
        };
        let client = reqwest::Client::new();
        let names: Vec<_> = default_sources(&cfg, &client)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names.len(), 9);
        assert!(!names.contains(&"twitter"));
        assert!(!names.contains(&"pkggodev"));
        assert_eq!(names[0], "hackernews");
    }
}
