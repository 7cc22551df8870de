// src/dedup.rs
//! Novelty gate. The seen-set is rebuilt from the mention log on every run and never stored.

use std::collections::HashSet;

use crate::mention::{Mention, RunState};

/// Owns the run's state while candidates are admitted.
#[derive(Debug)]
pub struct DedupStore {
    state: RunState,
    seen: HashSet<String>,
}

impl DedupStore {
    /// A log holding the same id more than once keeps only the first record of it.
    pub fn new(mut state: RunState) -> Self {
        let mut seen = HashSet::with_capacity(state.mentions.len());
        let loaded = state.mentions.len();
        state.mentions.retain(|m| seen.insert(m.id.clone()));
        if state.mentions.len() != loaded {
            tracing::warn!(
                loaded,
                kept = state.mentions.len(),
                "state file had duplicate ids, keeping first occurrence"
            );
        }
        Self { state, seen }
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Append every unseen candidate to the log, in order. Returns the accepted ones.
    ///
    /// An id admitted earlier in the same batch counts as seen, so the first occurrence wins.
    pub fn admit<I>(&mut self, candidates: I) -> Vec<Mention>
    where
        I: IntoIterator<Item = Mention>,
    {
        let mut fresh = Vec::new();
        for m in candidates {
            if !self.seen.insert(m.id.clone()) {
                tracing::debug!(id = %m.id, source = %m.source, "already seen");
                continue;
            }
            self.state.mentions.push(m.clone());
            fresh.push(m);
        }
        fresh
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }
}
