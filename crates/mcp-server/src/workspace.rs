//! Per-workspace wiring: stores, engines, orchestrator.

use chrono::Local;
use recall_refs::{ExpandEngine, FsStore, RefsOrchestrator, SemanticSearcher};
use recall_search::{parse_temporal_phrase, DateRange, TranscriptSearch};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RLM_MODEL: &str = "inverted-index-v1";

/// Everything the tool surface needs for one workspace root.
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    orchestrator: RefsOrchestrator,
    rlm: TranscriptSearch,
    expand: ExpandEngine,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store = Arc::new(FsStore::new(&root));
        let expand = ExpandEngine::new(store);
        let rlm = TranscriptSearch::new(Self::index_path_for(&root), root.join("sessions"));
        let orchestrator = RefsOrchestrator::new(expand.clone()).with_lexical(rlm.clone());
        Self {
            root,
            orchestrator,
            rlm,
            expand,
        }
    }

    /// Attach an external semantic searcher (script adapter or otherwise).
    #[must_use]
    pub fn with_semantic(mut self, searcher: Arc<dyn SemanticSearcher>) -> Self {
        self.orchestrator = self.orchestrator.with_semantic(searcher);
        self
    }

    #[must_use]
    pub fn index_path_for(root: &Path) -> PathBuf {
        root.join("memory").join("inverted-index.json")
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    #[must_use]
    pub fn orchestrator(&self) -> &RefsOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn rlm_engine(&self) -> &TranscriptSearch {
        &self.rlm
    }

    #[must_use]
    pub fn expand_engine(&self) -> &ExpandEngine {
        &self.expand
    }

    /// Temporal phrases in the query become a date-range filter.
    #[must_use]
    pub fn temporal_filter_for(&self, query: &str) -> Option<DateRange> {
        parse_temporal_phrase(query, Local::now().date_naive())
    }

    /// Stable fingerprint for the workspace root, so multi-session clients
    /// can detect cross-workspace mixups without seeing filesystem paths.
    #[must_use]
    pub fn root_fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.root.display().to_string().as_bytes());
        let digest = hasher.finalize();
        u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }
}
