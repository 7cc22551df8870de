// src/state.rs
//! Persisted [`RunState`]: permissive load, atomic save.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::mention::RunState;

/// State I/O failures. These are the only errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("reading state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding state: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty state. Anything unreadable or unparsable is an error.
    pub async fn load(&self) -> Result<RunState, StateError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(RunState::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write to a sibling temp file, then rename over the target.
    pub async fn save(&self, state: &RunState) -> Result<(), StateError> {
        let body = serde_json::to_vec_pretty(state).map_err(StateError::Encode)?;
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(write_err)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, &body).await.map_err(write_err)?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        tracing::debug!(path = %self.path.display(), mentions = state.mentions.len(), "state saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
