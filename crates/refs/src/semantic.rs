//! The semantic-searcher capability seam.
//!
//! Embeddings are out of scope; whatever provides them is handed in as a
//! boxed trait object. The orchestrator only relies on this contract: a
//! query either yields scored hits, or a typed error that maps onto the
//! `disabled` surface.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SemanticQuery {
    pub query: String,
    pub max_results: usize,
    pub min_score: Option<f64>,
}

/// A scored span returned by the external searcher. Line numbers are
/// 1-based and inclusive, matching the ref contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
    pub snippet: String,
    pub session_id: Option<String>,
}

#[derive(Error, Debug, Clone)]
pub enum SearcherError {
    /// The capability is not configured or not installed. Not retried.
    #[error("semantic searcher disabled: {0}")]
    Disabled(String),

    /// The searcher was reachable but the call failed.
    #[error("semantic search failed: {0}")]
    Failed(String),
}

pub type SearchFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<Vec<SemanticHit>, SearcherError>> + Send + 'a>>;

/// Object-safe async search capability.
pub trait SemanticSearcher: Send + Sync {
    /// Provider label surfaced in tool output.
    fn provider(&self) -> &str;

    /// Model label surfaced in tool output.
    fn model(&self) -> &str;

    fn search<'a>(&'a self, query: &'a SemanticQuery) -> SearchFuture<'a>;
}
