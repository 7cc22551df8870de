// src/notify/postgres.rs
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

use super::{deliver_each, DeliveryReport, ItemOutcome, Sink};
use crate::mention::Mention;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mentions (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        type TEXT NOT NULL,
        keyword TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT,
        url TEXT NOT NULL,
        author TEXT,
        discovered_at TIMESTAMPTZ NOT NULL,
        published_at TIMESTAMPTZ,
        status TEXT DEFAULT 'unread',
        created_at TIMESTAMPTZ DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_mentions_discovered_at ON mentions(discovered_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_mentions_url ON mentions(url)",
];

const INSERT: &str = r#"
    INSERT INTO mentions (id, source, type, keyword, title, content, url, author, discovered_at, published_at, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'unread', NOW())
    ON CONFLICT (id) DO NOTHING
"#;

/// Row per mention in a `mentions` table. Rows that already exist are left as they are.
pub struct PostgresSink {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PostgresSink {
    /// Validates the URL now; connects on first send.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(database_url)
            .context("invalid DATABASE_URL")?;
        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                for stmt in SCHEMA {
                    sqlx::query(stmt)
                        .execute(&self.pool)
                        .await
                        .context("creating mentions table")?;
                }
                tracing::debug!("postgres schema ready");
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn insert(&self, m: &Mention) -> Result<ItemOutcome> {
        let done = sqlx::query(INSERT)
            .bind(&m.id)
            .bind(&m.source)
            .bind(&m.kind)
            .bind(&m.keyword)
            .bind(&m.title)
            .bind(&m.content)
            .bind(&m.url)
            .bind(&m.author)
            .bind(m.discovered_at)
            .bind(m.published_at)
            .execute(&self.pool)
            .await
            .context("insert mention")?;
        Ok(insert_outcome(done.rows_affected()))
    }
}

/// `ON CONFLICT DO NOTHING` touches no row when the id is already stored.
fn insert_outcome(rows_affected: u64) -> ItemOutcome {
    if rows_affected == 0 {
        ItemOutcome::AlreadyPresent
    } else {
        ItemOutcome::Delivered
    }
}

#[async_trait::async_trait]
impl Sink for PostgresSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        // Without the table every insert would fail the same way; fail the sink once instead.
        self.ensure_schema().await?;
        Ok(deliver_each(self.name(), batch, |m| self.insert(m)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_url_is_rejected_up_front() {
        assert!(PostgresSink::connect_lazy("not a url").is_err());
        assert!(PostgresSink::connect_lazy("postgres://user:pw@localhost:5432/mentions").is_ok());
    }

    #[test]
    fn conflicting_insert_counts_as_already_present() {
        assert_eq!(insert_outcome(0), ItemOutcome::AlreadyPresent);
        assert_eq!(insert_outcome(1), ItemOutcome::Delivered);
    }

    /// Needs a reachable database: `DATABASE_URL=... cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn second_insert_of_same_id_is_skipped() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let sink = PostgresSink::connect_lazy(&url).unwrap();
        let id = format!("test_{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let m = Mention::new(id, "hackernews", "post", "lazypg", "https://x.test/pg");

        let first = sink.send(std::slice::from_ref(&m)).await.unwrap();
        let second = sink.send(std::slice::from_ref(&m)).await.unwrap();
        assert_eq!(first.delivered, 1);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.delivered, 0);
    }
}
