// src/ingest/providers/github.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;

use super::{check_status, gather, parse_json};
use crate::ingest::types::{request_timeout, Source, SourceError};
use crate::ingest::{normalize_text, truncate, CONTENT_MAX_CHARS};
use crate::mention::{stable_id, Mention};

const NAME: &str = "github";
const BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct IssueSearch {
    #[serde(default)]
    items: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    id: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    html_url: String,
    user: Option<User>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CodeSearch {
    #[serde(default)]
    items: Vec<CodeHit>,
}

#[derive(Debug, Deserialize)]
struct CodeHit {
    path: String,
    html_url: String,
    repository: Repo,
}

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
}

/// GitHub issues (last 24h) and `go.mod` files that reference the keyword.
///
/// Without a token only issue search runs: code search requires authentication.
pub struct GitHub {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GitHub {
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        deadline: Instant,
    ) -> Result<String, SourceError> {
        let endpoint = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(&endpoint)
            .query(query)
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(request_timeout(deadline, Duration::from_secs(15))?);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }
        let resp = req.send().await?;
        Ok(check_status(resp, &endpoint)?.text().await?)
    }

    async fn search(&self, keyword: &str, deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        let since = (Utc::now() - chrono::Duration::hours(24)).format("%Y-%m-%d");
        let body = self
            .get(
                "/search/issues",
                &[
                    ("q", format!("{keyword} created:>{since}")),
                    ("sort", "created".into()),
                    ("order", "desc".into()),
                ],
                deadline,
            )
            .await?;
        let mut out = parse_issues(&body, keyword)?;

        if self.token.is_some() {
            let code = self
                .get(
                    "/search/code",
                    &[
                        ("q", format!("{keyword} filename:go.mod")),
                        ("sort", "indexed".into()),
                        ("order", "desc".into()),
                        ("per_page", "10".into()),
                    ],
                    deadline,
                )
                .await;
            match code.and_then(|b| parse_code(&b, keyword)) {
                Ok(mut v) => out.append(&mut v),
                Err(SourceError::Timeout) => return Err(SourceError::Timeout),
                Err(e) => tracing::debug!(source = NAME, keyword, error = %e, "code search failed"),
            }
        }
        Ok(out)
    }
}

fn parse_issues(body: &str, keyword: &str) -> Result<Vec<Mention>, SourceError> {
    let parsed: IssueSearch = parse_json(body)?;
    Ok(parsed
        .items
        .into_iter()
        .map(|it| {
            Mention::new(stable_id(NAME, &it.id.to_string()), NAME, "issue", keyword, it.html_url)
                .title(normalize_text(&it.title))
                .content(truncate(
                    &normalize_text(it.body.as_deref().unwrap_or_default()),
                    CONTENT_MAX_CHARS,
                ))
                .author(it.user.map(|u| u.login).unwrap_or_default())
                .published_at(it.created_at)
        })
        .collect())
}

fn parse_code(body: &str, keyword: &str) -> Result<Vec<Mention>, SourceError> {
    let parsed: CodeSearch = parse_json(body)?;
    Ok(parsed
        .items
        .into_iter()
        .map(|it| {
            let native = format!("{}_{}", it.repository.full_name, it.path);
            Mention::new(stable_id("github_code", &native), NAME, "code", keyword, it.html_url)
                .title(format!("Used in {}", it.repository.full_name))
                .content(format!("Found in {}", it.path))
                .author(it.repository.full_name)
        })
        .collect())
}

#[async_trait]
impl Source for GitHub {
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
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ISSUES: &str = r#"{"total_count": 1, "items": [
        {"id": 42, "title": "Support lazypg themes", "body": "It would be nice...",
         "html_url": "https://github.com/rebelice/lazypg/issues/7",
         "user": {"login": "frank"}, "created_at": "2025-06-10T07:00:00Z"}
    ]}"#;

    const CODE: &str = r#"{"items": [
        {"name": "go.mod", "path": "go.mod", "html_url": "https://github.com/acme/tool/blob/main/go.mod",
         "repository": {"full_name": "acme/tool"}}
    ]}"#;

    #[test]
    fn issue_and_code_ids_are_stable() {
        let issues = parse_issues(ISSUES, "lazypg").unwrap();
        assert_eq!(issues[0].id, "github_42");
        assert_eq!(issues[0].author, "frank");
        let code = parse_code(CODE, "rebelice/lazypg").unwrap();
        assert_eq!(code[0].id, "github_code_acme/tool_go.mod");
        assert_eq!(code[0].kind, "code");
        assert_eq!(code[0].title, "Used in acme/tool");
    }

    #[tokio::test]
    async fn token_enables_code_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ISSUES))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/code"))
            .and(header("Authorization", "token sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CODE))
            .expect(1)
            .mount(&server)
            .await;

        let deadline = Instant::now() + Duration::from_secs(5);
        let kws = vec!["lazypg".to_string()];

        let anon = GitHub::new(reqwest::Client::new(), None).with_base_url(server.uri());
        assert_eq!(anon.collect(&kws, deadline).await.unwrap().len(), 1);

        let authed = GitHub::new(reqwest::Client::new(), Some("sekrit".into())).with_base_url(server.uri());
        assert_eq!(authed.collect(&kws, deadline).await.unwrap().len(), 2);
    }
}
