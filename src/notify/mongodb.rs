// src/notify/mongodb.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::OnceCell;

use super::{deliver_each, DeliveryReport, ItemOutcome, Sink};
use crate::mention::Mention;

const DATABASE: &str = "mention_monitor";
const COLLECTION: &str = "mentions";
const DUPLICATE_KEY: i32 = 11000;

struct Mentions {
    coll: Collection<Document>,
    /// False when the unique index on `id` could not be created; inserts then look up first.
    unique_id: bool,
}

/// Document per mention in `mention_monitor.mentions`. Documents that already exist are left alone.
pub struct MongoSink {
    uri: String,
    mentions: OnceCell<Mentions>,
}

impl MongoSink {
    /// Checks the URI scheme now; connects on first send.
    pub fn connect_lazy(uri: &str) -> Result<Self> {
        if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
            bail!("MONGODB_URI must start with mongodb:// or mongodb+srv://");
        }
        Ok(Self {
            uri: uri.to_string(),
            mentions: OnceCell::new(),
        })
    }

    async fn collection(&self) -> Result<&Mentions> {
        self.mentions
            .get_or_try_init(|| async {
                let mut opts = ClientOptions::parse(self.uri.as_str())
                    .await
                    .context("parsing MONGODB_URI")?;
                opts.app_name = Some("mention-monitor".to_string());
                opts.server_selection_timeout = Some(Duration::from_secs(10));
                let client = Client::with_options(opts).context("building mongodb client")?;
                let coll = client.database(DATABASE).collection::<Document>(COLLECTION);

                let unique_id = match coll.create_indexes(indexes()).await {
                    Ok(_) => {
                        tracing::debug!("mongodb indexes ready");
                        true
                    }
                    Err(e) => {
                        let error = e.to_string();
                        tracing::warn!(error = %error, "creating mongodb indexes failed, checking ids before insert");
                        false
                    }
                };
                Ok::<_, anyhow::Error>(Mentions { coll, unique_id })
            })
            .await
    }

    async fn insert(&self, mentions: &Mentions, m: &Mention) -> Result<ItemOutcome> {
        if !mentions.unique_id && contains(&mentions.coll, &m.id).await? {
            return Ok(ItemOutcome::AlreadyPresent);
        }
        match mentions.coll.insert_one(to_document(m, Utc::now())).await {
            Ok(_) => Ok(ItemOutcome::Delivered),
            Err(e) if is_duplicate_key(&e) => {
                tracing::debug!(id = %m.id, "mongodb already has mention");
                Ok(ItemOutcome::AlreadyPresent)
            }
            Err(e) => Err(e).context("insert mention"),
        }
    }
}

async fn contains(coll: &Collection<Document>, id: &str) -> Result<bool> {
    let n = coll
        .count_documents(doc! { "id": id })
        .await
        .context("looking up mention id")?;
    Ok(n > 0)
}

fn indexes() -> Vec<IndexModel> {
    vec![
        IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build(),
        IndexModel::builder().keys(doc! { "url": 1 }).build(),
        IndexModel::builder().keys(doc! { "discovered_at": -1 }).build(),
    ]
}

fn bson_time(ts: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(ts.timestamp_millis())
}

fn to_document(m: &Mention, created_at: DateTime<Utc>) -> Document {
    doc! {
        "id": m.id.as_str(),
        "source": m.source.as_str(),
        "type": m.kind.as_str(),
        "keyword": m.keyword.as_str(),
        "title": m.title.as_str(),
        "content": m.content.as_str(),
        "url": m.url.as_str(),
        "author": m.author.as_str(),
        "discovered_at": bson_time(m.discovered_at),
        "published_at": m.published_at.map(bson_time),
        "status": "unread",
        "created_at": bson_time(created_at),
    }
}

fn is_duplicate_code(code: i32) -> bool {
    code == DUPLICATE_KEY
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => is_duplicate_code(we.code),
        ErrorKind::Command(ce) => is_duplicate_code(ce.code),
        _ => false,
    }
}

#[async_trait::async_trait]
impl Sink for MongoSink {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        let mentions = self.collection().await?;
        Ok(deliver_each(self.name(), batch, |m| self.insert(mentions, m)).await)
    }
}
