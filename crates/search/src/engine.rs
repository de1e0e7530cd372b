//! The three-tier query pipeline and its full-scan fallback.
//!
//! Tier 1 intersects posting lists (smallest first, early exit), Tier 2
//! ranks the candidates by a cheap substring fraction and keeps the top
//! forty, Tier 3 runs the enhanced matcher over the survivors for precise
//! per-line hits. The fallback path runs the same matcher over every
//! transcript, which is what makes the index purely an accelerator: the
//! indexed result set is always a subset of what the fallback would find.

use crate::matcher::{extract_snippet, score_message, weighted_query_terms, WeightedTerm};
use crate::temporal::DateRange;
use crate::{Result, MAX_CONTENT_WORDS};
use recall_indexer::tokenize::token_set;
use recall_indexer::transcript::{iso_date_prefix, read_messages, TranscriptMessage};
use recall_indexer::{assess_staleness, scan_transcripts, InvertedIndex, StaleReason};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Candidates surviving the coarse tier.
const COARSE_RETAIN: usize = 40;
/// Precise hits kept per session.
const HITS_PER_SESSION: usize = 3;
/// Terms fed to the enhanced matcher.
const MAX_QUERY_TERMS: usize = 5;
const SNIPPET_LEN: usize = 500;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub temporal_filter: Option<DateRange>,
    pub min_score: Option<f64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: recall_protocol::defaults::MAX_RESULTS,
            temporal_filter: None,
            min_score: None,
        }
    }
}

/// Which pipeline produced the results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchPath {
    Index,
    Fallback,
    Hybrid,
}

/// One precise hit inside a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMatch {
    pub session_id: String,
    /// Workspace-relative transcript path (`sessions/<id>.jsonl`).
    pub path: String,
    pub line_number: usize,
    pub role: String,
    pub snippet: String,
    pub match_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub results: Vec<SessionMatch>,
    pub search_path: SearchPath,
    pub candidates_found: usize,
    pub sessions_scanned: usize,
    pub query_time_ms: u64,
    pub total_time_ms: u64,
}

/// Retrieval engine over an index file and its sessions directory.
#[derive(Debug, Clone)]
pub struct TranscriptSearch {
    index_path: PathBuf,
    sessions_dir: PathBuf,
}

impl TranscriptSearch {
    pub fn new(index_path: impl Into<PathBuf>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            sessions_dir: sessions_dir.into(),
        }
    }

    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchOutcome> {
        let this = self.clone();
        let query = query.to_string();
        let options = options.clone();
        tokio::task::spawn_blocking(move || this.search_blocking(&query, &options))
            .await
            .map_err(|err| crate::SearchError::Other(format!("join search task: {err}")))?
    }

    pub fn search_blocking(&self, query: &str, options: &SearchOptions) -> Result<SearchOutcome> {
        let total_start = Instant::now();

        // Readers take a fresh snapshot per query; the maintainer's atomic
        // rename guarantees it is always a consistent one.
        let (index, index_corrupt) = match InvertedIndex::load(&self.index_path) {
            Ok(index) => (index, false),
            Err(err) => {
                log::warn!("index unreadable, using fallback: {err}");
                (None, true)
            }
        };

        let terms = weighted_query_terms(query, MAX_QUERY_TERMS);
        let query_start = Instant::now();

        let Some(index) = index else {
            return Ok(self.finish_fallback(query, &terms, options, total_start, query_start));
        };

        // Tier 1: posting-list intersection.
        let tokens = token_set(query);
        let mut lists: Vec<&[String]> = tokens
            .iter()
            .filter_map(|token| index.posting(token))
            .collect();
        if lists.is_empty() {
            return Ok(self.finish_fallback(query, &terms, options, total_start, query_start));
        }
        lists.sort_by_key(|list| list.len());

        let mut candidates: HashSet<&str> = lists[0].iter().map(String::as_str).collect();
        for list in &lists[1..] {
            let next: HashSet<&str> = list.iter().map(String::as_str).collect();
            candidates.retain(|id| next.contains(id));
            if candidates.is_empty() {
                break;
            }
        }
        if candidates.is_empty() {
            return Ok(self.finish_fallback(query, &terms, options, total_start, query_start));
        }
        let candidates_found = candidates.len();

        // Tier 2: coarse substring fraction over a capped session digest.
        let mut loaded: HashMap<String, Vec<TranscriptMessage>> = HashMap::new();
        let mut coarse: Vec<(String, f64)> = Vec::new();
        for session_id in candidates {
            let messages = self.load_session(session_id, &index);
            let score = coarse_score(&tokens, &index, session_id, &messages);
            loaded.insert(session_id.to_string(), messages);
            coarse.push((session_id.to_string(), score));
        }
        coarse.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        coarse.truncate(COARSE_RETAIN);

        // Temporal filter restricts the survivors before the expensive tier.
        if let Some(range) = &options.temporal_filter {
            coarse.retain(|(session_id, _)| {
                index
                    .sessions
                    .get(session_id)
                    .filter(|entry| !entry.date_invalid)
                    .and_then(|entry| entry.date.as_deref())
                    .is_some_and(|date| range.contains(date))
            });
        }

        // Tier 3: enhanced matcher on each survivor.
        let mut results = Vec::new();
        for (session_id, _) in &coarse {
            let messages = loaded.remove(session_id).unwrap_or_default();
            let date = index
                .sessions
                .get(session_id)
                .and_then(|entry| entry.date.clone());
            results.extend(session_hits(session_id, &date, &messages, &terms, query));
        }

        let mut search_path = SearchPath::Index;
        let mut sessions_scanned = coarse.len();

        // A stale index still serves; the sessions it is missing or behind
        // on get a targeted scan and the outcome is tagged hybrid.
        let staleness = assess_staleness(Some(&index), index_corrupt, &self.sessions_dir);
        if staleness.stale {
            let scanned_ids: HashSet<&str> = coarse.iter().map(|(id, _)| id.as_str()).collect();
            let mut gap_hits = Vec::new();
            for reason in &staleness.reasons {
                let session_id = match reason {
                    StaleReason::SessionFileNewer { session_id }
                    | StaleReason::SessionUnindexed { session_id } => session_id.as_str(),
                    _ => continue,
                };
                if scanned_ids.contains(session_id) {
                    continue;
                }
                let messages = self.load_session(session_id, &index);
                let date = messages
                    .iter()
                    .find_map(|m| m.timestamp.as_deref())
                    .and_then(iso_date_prefix);
                if let Some(range) = &options.temporal_filter {
                    if !date.as_deref().is_some_and(|d| range.contains(d)) {
                        continue;
                    }
                }
                sessions_scanned += 1;
                gap_hits.extend(session_hits(session_id, &date, &messages, &terms, query));
            }
            if !gap_hits.is_empty() {
                results.extend(gap_hits);
                search_path = SearchPath::Hybrid;
            }
        }

        if results.is_empty() {
            return Ok(self.finish_fallback(query, &terms, options, total_start, query_start));
        }

        let results = rank(results, options);
        Ok(SearchOutcome {
            results,
            search_path,
            candidates_found,
            sessions_scanned,
            query_time_ms: query_start.elapsed().as_millis() as u64,
            total_time_ms: total_start.elapsed().as_millis() as u64,
        })
    }

    /// Full scan: the enhanced matcher over every known transcript.
    pub fn full_scan_blocking(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let total_start = Instant::now();
        let terms = weighted_query_terms(query, MAX_QUERY_TERMS);
        let query_start = Instant::now();
        Ok(self.finish_fallback(query, &terms, options, total_start, query_start))
    }

    fn finish_fallback(
        &self,
        query: &str,
        terms: &[WeightedTerm],
        options: &SearchOptions,
        total_start: Instant,
        query_start: Instant,
    ) -> SearchOutcome {
        let mut results = Vec::new();
        let mut sessions_scanned = 0usize;

        for (session_id, path, _) in scan_transcripts(&self.sessions_dir) {
            let messages = read_messages(&path).unwrap_or_default();
            let date = messages
                .iter()
                .find_map(|m| m.timestamp.as_deref())
                .and_then(iso_date_prefix);
            if let Some(range) = &options.temporal_filter {
                if !date.as_deref().is_some_and(|d| range.contains(d)) {
                    continue;
                }
            }
            sessions_scanned += 1;
            results.extend(session_hits(&session_id, &date, &messages, terms, query));
        }

        let results = rank(results, options);
        SearchOutcome {
            results,
            search_path: SearchPath::Fallback,
            candidates_found: 0,
            sessions_scanned,
            query_time_ms: query_start.elapsed().as_millis() as u64,
            total_time_ms: total_start.elapsed().as_millis() as u64,
        }
    }

    fn load_session(&self, session_id: &str, index: &InvertedIndex) -> Vec<TranscriptMessage> {
        let path = index
            .sessions
            .get(session_id)
            .map(|entry| PathBuf::from(&entry.path))
            .filter(|p| p.exists())
            .unwrap_or_else(|| self.sessions_dir.join(format!("{session_id}.jsonl")));
        read_messages(&path).unwrap_or_default()
    }
}

/// Tier-2 score: fraction of query tokens present as a substring of the
/// session's topics or its (capped) text.
fn coarse_score(
    tokens: &[String],
    index: &InvertedIndex,
    session_id: &str,
    messages: &[TranscriptMessage],
) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let mut digest = index
        .sessions
        .get(session_id)
        .map(|entry| entry.topics.join(" "))
        .unwrap_or_default();
    let mut budget = MAX_CONTENT_WORDS;
    for message in messages {
        if budget == 0 {
            break;
        }
        let words = message.text.split_whitespace().count();
        digest.push(' ');
        digest.push_str(&message.text);
        budget = budget.saturating_sub(words.max(1));
    }
    let digest = digest.to_lowercase();
    let hits = tokens.iter().filter(|t| digest.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

/// Run the enhanced matcher over one session's messages, keeping its best
/// hits. Per-session content is capped by the matcher's word budget.
fn session_hits(
    session_id: &str,
    date: &Option<String>,
    messages: &[TranscriptMessage],
    terms: &[WeightedTerm],
    query: &str,
) -> Vec<SessionMatch> {
    let mut hits = Vec::new();
    let mut budget = MAX_CONTENT_WORDS;

    for message in messages {
        if budget == 0 {
            break;
        }
        budget = budget.saturating_sub(message.text.split_whitespace().count().max(1));

        let score = score_message(&message.text, terms, query);
        if score <= 0.0 {
            continue;
        }
        hits.push(SessionMatch {
            session_id: session_id.to_string(),
            path: format!("sessions/{session_id}.jsonl"),
            line_number: message.line_number,
            role: message.role.clone(),
            snippet: extract_snippet(&message.text, terms, SNIPPET_LEN),
            match_score: score,
            date: date.clone(),
        });
    }

    hits.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    hits.truncate(HITS_PER_SESSION);
    hits
}

/// Final ordering: score descending, newer sessions first on ties, then
/// stable by session id and line for determinism.
fn rank(mut results: Vec<SessionMatch>, options: &SearchOptions) -> Vec<SessionMatch> {
    if let Some(min_score) = options.min_score {
        results.retain(|r| r.match_score >= min_score);
    }
    results.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.date.cmp(&a.date))
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    results.truncate(options.max_results);
    results
}
