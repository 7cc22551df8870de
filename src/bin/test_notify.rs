//! Sends one synthetic mention through every configured sink. Touches no run state.

use std::process::ExitCode;

use chrono::Utc;
use mention_monitor::ingest::providers::http_client;
use mention_monitor::notify::{dispatch, sinks_from_config};
use mention_monitor::{init_tracing, Mention, MonitorConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match MonitorConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e:#}");
            return ExitCode::from(2);
        }
    };
    let sinks = match http_client().and_then(|c| sinks_from_config(&cfg.sinks, &c)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("could not set up sinks: {e:#}");
            return ExitCode::from(2);
        }
    };
    if sinks.is_empty() {
        println!("no sinks configured; nothing to test");
        return ExitCode::SUCCESS;
    }

    let now = Utc::now();
    let mut mention = Mention::new(
        format!("test_{}", now.format("%Y%m%d%H%M%S")),
        "hackernews",
        "post",
        cfg.keywords.first().map(String::as_str).unwrap_or("lazypg"),
        "https://news.ycombinator.com/item?id=12345678",
    )
    .title("Show HN: lazypg - A terminal UI for PostgreSQL")
    .content("I built a terminal UI for PostgreSQL inspired by lazygit. It supports vim keybindings, JSONB viewer, and more.")
    .author("test_user")
    .published_at(Some(now));
    mention.discovered_at = now;

    println!("sending test mention {} to {} sink(s)", mention.id, sinks.len());
    let reports = dispatch(&sinks, std::slice::from_ref(&mention), cfg.run.sink_timeout).await;

    let mut failed = false;
    for r in &reports {
        match &r.result {
            Ok(d) if d.is_clean() => println!("{}: ok ({} ms)", r.sink, r.elapsed.as_millis()),
            Ok(d) => {
                failed = true;
                println!("{}: item errors {:?}", r.sink, d.failed);
            }
            Err(e) => {
                failed = true;
                println!("{}: {e}", r.sink);
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
