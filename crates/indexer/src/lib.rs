//! # Recall Indexer
//!
//! Inverted-index maintenance for session transcripts.
//!
//! ## Pipeline
//!
//! ```text
//! sessions/<id>.jsonl
//!     │
//!     ├──> Transcript reader (line-delimited JSON, resumes at watermark)
//!     │      └─> Messages
//!     │
//!     ├──> Tokeniser (shared with the query side)
//!     │      └─> Terms
//!     │
//!     └──> Index Maintainer (file lock, atomic rename)
//!            └─> inverted-index.json
//! ```
//!
//! The refresher listens for transcript updates and schedules incremental
//! `update_index` runs with per-session debounce and cooldown.

mod error;
mod index;
mod maintainer;
mod refresher;
mod staleness;
mod stats;
pub mod tokenize;
pub mod transcript;

pub use error::{IndexerError, Result};
pub use index::{InvertedIndex, SessionEntry, INDEX_VERSION};
pub use maintainer::{index_write_lock_wait_ms_last, index_write_lock_wait_ms_max, IndexMaintainer};
pub use refresher::{
    IndexRefresher, IndexUpdateEvent, RefresherConfig, RefresherHealth, TranscriptUpdate,
};
pub use index::unix_now_ms;
pub use staleness::{
    assess_staleness, scan_transcripts, StaleAssessment, StaleReason, STALENESS_SKEW_MS,
};
pub use stats::{BuildStats, UpdateStats};
