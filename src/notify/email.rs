use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{source_display_name, DeliveryReport, Sink};
use crate::config::EmailConfig;
use crate::mention::Mention;

pub struct EmailSink {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSink {
    pub fn new(cfg: &EmailConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.smtp_user.clone(), cfg.smtp_pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = cfg.from.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = cfg.to.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }
}

fn subject(batch: &[Mention]) -> String {
    format!("[mention-monitor] {} new mention(s)", batch.len())
}

fn body(batch: &[Mention]) -> String {
    let mut out = String::new();
    for (i, m) in batch.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}] {}\n   keyword: {}  type: {}",
            i + 1,
            source_display_name(&m.source),
            m.title,
            m.keyword,
            m.kind
        ));
        if !m.author.is_empty() {
            out.push_str(&format!("  by: {}", m.author));
        }
        out.push_str(&format!("\n   {}\n\n", m.url));
    }
    out
}

#[async_trait::async_trait]
impl Sink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, batch: &[Mention]) -> Result<DeliveryReport> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(batch))
            .header(header::ContentType::TEXT_PLAIN)
            .body(body(batch))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(DeliveryReport::whole_batch(batch.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::stable_id;

    fn cfg(from: &str) -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_user: "u".into(),
            smtp_pass: "p".into(),
            from: from.into(),
            to: "me@example.com".into(),
        }
    }

    #[test]
    fn digest_lists_every_mention() {
        let batch = vec![
            Mention::new(stable_id("hn", "1"), "hackernews", "post", "lazypg", "https://x.test/1")
                .title("Show HN: lazypg")
                .author("alice"),
            Mention::new(stable_id("devto", "9"), "devto", "article", "lazypg", "https://dev.to/x"),
        ];
        assert_eq!(subject(&batch), "[mention-monitor] 2 new mention(s)");
        let text = body(&batch);
        assert!(text.starts_with("1. [Hacker News] Show HN: lazypg\n   keyword: lazypg  type: post  by: alice"));
        assert!(text.contains("2. [Dev.to]"));
        assert!(text.contains("https://dev.to/x"));
    }

    #[tokio::test]
    async fn invalid_addresses_are_config_errors() {
        assert!(EmailSink::new(&cfg("not an address")).is_err());
        assert!(EmailSink::new(&cfg("monitor@example.com")).is_ok());
    }
}
