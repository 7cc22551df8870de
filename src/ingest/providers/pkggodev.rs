// src/ingest/providers/pkggodev.rs
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::time::Instant;

use super::{check_status, gather};
use crate::ingest::types::{request_timeout, Source, SourceError};
use crate::mention::{stable_id, Mention};

const NAME: &str = "pkggodev";
const BASE_URL: &str = "https://pkg.go.dev";

static IMPORTER_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".ImportedBy-list a").expect("static selector"));

/// Reverse dependencies of Go packages from the pkg.go.dev "Imported by" tab.
///
/// Only keywords that look like module paths (`owner/repo`) are queried.
pub struct PkgGoDev {
    client: reqwest::Client,
    base_url: String,
}

impl PkgGoDev {
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

    async fn imported_by(&self, keyword: &str, deadline: Instant) -> Result<Vec<Mention>, SourceError> {
        let pkg = package_path(keyword);
        let endpoint = format!("{}/{}", self.base_url, pkg);
        let resp = self
            .client
            .get(&endpoint)
            .query(&[("tab", "importedby")])
            .timeout(request_timeout(deadline, Duration::from_secs(20))?)
            .send()
            .await?;
        let body = check_status(resp, &endpoint)?.text().await?;
        Ok(parse_importers(&body, pkg, keyword))
    }
}

/// `github.com/` is implied for bare `owner/repo` keywords.
fn package_path(keyword: &str) -> String {
    let kw = keyword.trim().trim_matches('/');
    if kw.split('/').next().is_some_and(|host| host.contains('.')) {
        kw.to_string()
    } else {
        format!("github.com/{kw}")
    }
}

fn parse_importers(html: &str, pkg: String, keyword: &str) -> Vec<Mention> {
    let doc = Html::parse_document(html);
    doc.select(&IMPORTER_LINKS)
        .filter_map(|a| {
            let importer = a.text().collect::<String>().trim().to_string();
            let href = a.value().attr("href")?.trim();
            if importer.is_empty() || href.is_empty() {
                return None;
            }
            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{BASE_URL}{href}")
            };
            Some(
                Mention::new(
                    stable_id(NAME, &format!("{pkg}_{importer}")),
                    NAME,
                    "import",
                    keyword,
                    url,
                )
                .title(format!("Imported by {importer}"))
                .content(format!("Package {importer} imports {pkg}"))
                .author(importer),
            )
        })
        .collect()
}

#[async_trait]
impl Source for PkgGoDev {
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError> {
        let requests = keywords
            .iter()
            .filter(|kw| kw.contains('/'))
            .map(|kw| self.imported_by(kw, deadline))
            .collect();
        gather(NAME, requests).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
