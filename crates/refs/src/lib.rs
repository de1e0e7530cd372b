//! # Recall Refs
//!
//! Reference-first retrieval: queries return compact `(path, line-range,
//! preview)` pointers that the caller expands lazily into bounded text
//! windows. The orchestrator merges the semantic searcher (when one is
//! configured) with the lexical transcript engine, applies the binary-blob
//! safety filter, and optionally runs the bounded multi-hop loop whose
//! follow-up queries are derived from the snippets it expanded.

mod derive;
mod expand;
mod orchestrator;
mod preview;
mod semantic;
mod store;

pub use derive::derive_query;
pub use expand::{ExpandEngine, ExpandOptions, ExpandOutcome};
pub use orchestrator::{HitsOutcome, RefsOptions, RefsOrchestrator, RefsOutcome};
pub use preview::{looks_like_blob, make_preview};
pub use semantic::{SearchFuture, SearcherError, SemanticHit, SemanticQuery, SemanticSearcher};
pub use store::{FileStore, FsStore, StoreError};
