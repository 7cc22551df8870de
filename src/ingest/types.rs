// src/ingest/types.rs
use std::time::Duration;

use tokio::time::Instant;

use crate::mention::Mention;

/// Why a source produced nothing this round. Always recoverable.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("deadline exceeded")]
    Timeout,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("malformed response: {0}")]
    Parse(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One external content system. Produces candidates only; never touches run state.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Must return before `deadline`; the aggregator drops the call once it passes.
    async fn collect(
        &self,
        keywords: &[String],
        deadline: Instant,
    ) -> Result<Vec<Mention>, SourceError>;

    fn name(&self) -> &'static str;
}

/// Time left until `deadline`, or `Timeout` once it is gone.
pub fn remaining(deadline: Instant) -> Result<Duration, SourceError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(SourceError::Timeout)
    } else {
        Ok(left)
    }
}

/// Per-request timeout: `cap`, shortened to whatever is left of the run.
pub fn request_timeout(deadline: Instant, cap: Duration) -> Result<Duration, SourceError> {
    remaining(deadline).map(|left| left.min(cap))
}
