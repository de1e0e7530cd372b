//! On-disk inverted index model.
//!
//! Persisted as a single JSON document `{version, tokens, sessions,
//! lastUpdated}`. Posting lists are sorted, duplicate-free lists of session
//! ids; every posted session id has a `sessions` entry. Writers replace the
//! file with an fsynced temp file and an atomic rename, so readers always
//! observe a consistent snapshot.

use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Number of transcript lines already consumed. Monotonically
    /// non-decreasing; the incremental updater resumes here.
    pub last_indexed_line: usize,
    /// Top tokens by in-session frequency, small k.
    pub topics: Vec<String>,
    /// ISO `YYYY-MM-DD`, when the transcript metadata yields one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Sessions whose metadata carried a non-ISO date are indexed for
    /// lexical search but excluded from temporal filtering.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub date_invalid: bool,
    pub path: String,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvertedIndex {
    pub version: u32,
    /// token → sorted, deduplicated session ids.
    pub tokens: BTreeMap<String, Vec<String>>,
    pub sessions: BTreeMap<String, SessionEntry>,
    /// Unix milliseconds of the last successful write.
    pub last_updated: u64,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl InvertedIndex {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            tokens: BTreeMap::new(),
            sessions: BTreeMap::new(),
            last_updated: 0,
        }
    }

    /// Insert `session_id` into the token's posting list, keeping the list
    /// sorted and duplicate-free. Returns true when a posting was added.
    pub fn insert_posting(&mut self, token: &str, session_id: &str) -> bool {
        let list = self.tokens.entry(token.to_string()).or_default();
        match list.binary_search_by(|probe| probe.as_str().cmp(session_id)) {
            Ok(_) => false,
            Err(pos) => {
                list.insert(pos, session_id.to_string());
                true
            }
        }
    }

    #[must_use]
    pub fn posting(&self, token: &str) -> Option<&[String]> {
        self.tokens.get(token).map(Vec::as_slice)
    }

    #[must_use]
    pub fn total_postings(&self) -> usize {
        self.tokens.values().map(Vec::len).sum()
    }

    /// Structural invariants: posting lists sorted and duplicate-free, and
    /// every posted session id present in `sessions`.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (token, list) in &self.tokens {
            if !list.windows(2).all(|w| w[0] < w[1]) {
                return Err(format!("posting list for '{token}' is not strictly sorted"));
            }
            for session_id in list {
                if !self.sessions.contains_key(session_id) {
                    return Err(format!(
                        "token '{token}' posts unknown session '{session_id}'"
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn stamp(&mut self) {
        self.last_updated = unix_now_ms();
    }

    /// Read and parse the index. `Ok(None)` when the file does not exist;
    /// a parse failure surfaces as [`IndexerError::Corrupt`] so callers can
    /// fall back to the full-scan path and schedule a rebuild.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let index: Self = serde_json::from_slice(&bytes)?;
        Ok(Some(index))
    }

    /// Serialise to a sibling temp file, fsync, then atomically rename over
    /// the index path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| IndexerError::InvalidPath("index path has no parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let tmp = path.with_extension("json.tmp");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp)?;
            serde_json::to_writer(&mut file, self)?;
            file.flush()?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Unix milliseconds now; saturates instead of panicking on clock skew.
#[must_use]
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
