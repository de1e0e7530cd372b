//! Lazy staleness assessment.
//!
//! The index is stale iff some known session file's mtime exceeds the
//! index's `last_updated` by more than a skew allowance, or a transcript
//! exists on disk with no `sessions` entry. A stale index still serves
//! queries; the fallback path covers the gap until a rebuild lands.

use crate::index::InvertedIndex;
use serde::Serialize;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Filesystem timestamp granularity allowance.
pub const STALENESS_SKEW_MS: u64 = 2_000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StaleReason {
    IndexMissing,
    IndexCorrupt,
    SessionFileNewer { session_id: String },
    SessionUnindexed { session_id: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StaleAssessment {
    pub stale: bool,
    pub reasons: Vec<StaleReason>,
}

/// Compare the loaded index against the transcripts on disk.
///
/// Pass `None` for a missing index and `index_corrupt = true` when the file
/// existed but failed to parse.
#[must_use]
pub fn assess_staleness(
    index: Option<&InvertedIndex>,
    index_corrupt: bool,
    sessions_dir: &Path,
) -> StaleAssessment {
    let mut reasons = Vec::new();

    if index_corrupt {
        reasons.push(StaleReason::IndexCorrupt);
    }
    let Some(index) = index else {
        if !index_corrupt {
            reasons.push(StaleReason::IndexMissing);
        }
        return StaleAssessment {
            stale: true,
            reasons,
        };
    };

    for (session_id, path, mtime_ms) in scan_transcripts(sessions_dir) {
        match index.sessions.get(&session_id) {
            None => reasons.push(StaleReason::SessionUnindexed { session_id }),
            Some(_) => {
                if mtime_ms > index.last_updated.saturating_add(STALENESS_SKEW_MS) {
                    log::debug!(
                        "session {} newer than index ({} > {})",
                        path.display(),
                        mtime_ms,
                        index.last_updated
                    );
                    reasons.push(StaleReason::SessionFileNewer { session_id });
                }
            }
        }
    }

    StaleAssessment {
        stale: !reasons.is_empty(),
        reasons,
    }
}

/// Enumerate `<id>.jsonl` transcripts with their mtimes. Rotated-away files
/// (`.deleted` suffix) are ignored.
#[must_use]
pub fn scan_transcripts(sessions_dir: &Path) -> Vec<(String, std::path::PathBuf, u64)> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(sessions_dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".jsonl") {
            continue;
        }
        let Ok(session_id) = crate::transcript::session_id_from_path(&path) else {
            continue;
        };
        let mtime_ms = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        out.push((session_id, path, mtime_ms));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}
