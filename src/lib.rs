// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dedup;
pub mod ingest;
pub mod mention;
pub mod metrics;
pub mod notify;
pub mod runner;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::config::MonitorConfig;
pub use crate::dedup::DedupStore;
pub use crate::ingest::types::{Source, SourceError};
pub use crate::mention::{stable_id, Mention, RunState};
pub use crate::notify::{DeliveryReport, Sink};
pub use crate::runner::{Monitor, RunError, RunReport, RunSettings};
pub use crate::state::{StateError, StateStore};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` filters; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mention_monitor=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().compact().with_target(false)).init();
    }
}
