//! # Recall Search
//!
//! Inverted-index retrieval over session transcripts.
//!
//! A query runs through three tiers: posting-list intersection over the
//! on-disk index, coarse substring ranking of the candidates, and the
//! enhanced lexical matcher (substring, compound splitting, bounded fuzzy,
//! concept expansion) on the survivors. When the index is absent, the
//! candidate set is empty, or the final tier comes back dry, the engine
//! falls back to a full scan with the same matcher, so the index can only
//! ever make a query faster, not change what it finds.

mod concepts;
mod engine;
mod error;
mod matcher;
pub mod temporal;

pub use concepts::related_concepts;
pub use engine::{
    SearchOptions, SearchOutcome, SearchPath, SessionMatch, TranscriptSearch,
};
pub use error::{Result, SearchError};
pub use matcher::{
    extract_snippet, fuzzy_match, levenshtein, score_message, substring_match,
    weighted_query_terms, WeightedTerm, MAX_CONTENT_WORDS, MAX_FUZZY_SCAN, MAX_SUBSTRING_SCAN,
};
pub use temporal::{parse_temporal_phrase, DateRange};
