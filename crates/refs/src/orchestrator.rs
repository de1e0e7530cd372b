//! Refs-first orchestration.
//!
//! One search pass consults the semantic searcher (when configured) and
//! the lexical transcript engine, shapes every hit into a compact ref, and
//! drops anything the blob filter flags. The recursive path repeats the
//! pass under hop budgets, feeding each hop's expanded snippets through
//! the query-derivation heuristic to form the next query. Scores from the
//! two sources are not comparable, so ranked results are interleaved
//! per-source instead of sorted across sources.

use crate::derive::derive_query;
use crate::expand::{ExpandEngine, ExpandOptions};
use crate::preview::{looks_like_blob, make_preview};
use crate::semantic::{SearcherError, SemanticQuery, SemanticSearcher};
use recall_protocol::{
    defaults, ExpandRequestRef, ExpandResult, HopReport, MemoryRef, RecursiveConfig,
    RecursiveReport, RefSource, SearchHit,
};
use recall_search::{SearchOptions, SearchPath, TranscriptSearch};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RefsOptions {
    pub max_results: usize,
    pub min_score: Option<f64>,
    pub preview_chars: usize,
    pub recursive: Option<RecursiveConfig>,
}

impl Default for RefsOptions {
    fn default() -> Self {
        Self {
            max_results: defaults::MAX_RESULTS,
            min_score: None,
            preview_chars: defaults::PREVIEW_CHARS,
            recursive: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefsOutcome {
    pub query: String,
    pub refs: Vec<MemoryRef>,
    pub provider: String,
    pub model: String,
    pub disabled: bool,
    pub error: Option<String>,
    pub fallback: bool,
    pub recursive: Option<RecursiveReport>,
}

/// Snippet-bearing variant for the plain search operations.
#[derive(Debug, Clone)]
pub struct HitsOutcome {
    pub results: Vec<SearchHit>,
    pub provider: String,
    pub model: String,
    pub disabled: bool,
    pub error: Option<String>,
    pub fallback: bool,
}

#[derive(Clone)]
pub struct RefsOrchestrator {
    semantic: Option<Arc<dyn SemanticSearcher>>,
    lexical: Option<TranscriptSearch>,
    expand: ExpandEngine,
}

impl RefsOrchestrator {
    pub fn new(expand: ExpandEngine) -> Self {
        Self {
            semantic: None,
            lexical: None,
            expand,
        }
    }

    #[must_use]
    pub fn with_semantic(mut self, searcher: Arc<dyn SemanticSearcher>) -> Self {
        self.semantic = Some(searcher);
        self
    }

    #[must_use]
    pub fn with_lexical(mut self, engine: TranscriptSearch) -> Self {
        self.lexical = Some(engine);
        self
    }

    #[must_use]
    pub fn expand_engine(&self) -> &ExpandEngine {
        &self.expand
    }

    fn provider_label(&self) -> (String, String) {
        match &self.semantic {
            Some(searcher) => (searcher.provider().to_string(), searcher.model().to_string()),
            None => ("lexical".to_string(), "enhanced-match".to_string()),
        }
    }

    /// Snippet-level search for the non-refs operations.
    pub async fn search_hits(
        &self,
        query: &str,
        max_results: usize,
        min_score: Option<f64>,
    ) -> HitsOutcome {
        let (provider, model) = self.provider_label();
        match self.single_pass(query, max_results, min_score).await {
            Ok(pass) => HitsOutcome {
                results: pass.hits,
                provider,
                model,
                disabled: false,
                error: None,
                fallback: pass.fallback,
            },
            Err(error) => HitsOutcome {
                results: Vec::new(),
                provider,
                model,
                disabled: true,
                error: Some(error),
                fallback: false,
            },
        }
    }

    /// Ref-level search; recursive when the options say so.
    pub async fn search_refs(&self, query: &str, options: &RefsOptions) -> RefsOutcome {
        let (provider, model) = self.provider_label();
        let disabled = |error: String| RefsOutcome {
            query: query.to_string(),
            refs: Vec::new(),
            provider: provider.clone(),
            model: model.clone(),
            disabled: true,
            error: Some(error),
            fallback: false,
            recursive: None,
        };

        match &options.recursive {
            Some(cfg) if cfg.enabled => match self.recursive_refs(query, options, *cfg).await {
                Ok(outcome) => outcome,
                Err(error) => disabled(error),
            },
            _ => match self
                .single_pass_refs(query, options.max_results, options, None)
                .await
            {
                Ok((refs, fallback)) => RefsOutcome {
                    query: query.to_string(),
                    refs,
                    provider,
                    model,
                    disabled: false,
                    error: None,
                    fallback,
                    recursive: None,
                },
                Err(error) => disabled(error),
            },
        }
    }

    async fn recursive_refs(
        &self,
        query: &str,
        options: &RefsOptions,
        cfg: RecursiveConfig,
    ) -> Result<RefsOutcome, String> {
        let (provider, model) = self.provider_label();

        // Accumulator keyed by (path, start, end): first writer wins the
        // hop tag, the best score survives.
        let mut order: Vec<(String, usize, usize)> = Vec::new();
        let mut by_key: HashMap<(String, usize, usize), MemoryRef> = HashMap::new();
        let mut expanded_keys: HashSet<(String, usize, usize)> = HashSet::new();
        let mut hops: Vec<HopReport> = Vec::new();
        let mut remaining = cfg.max_total_expanded_chars;
        let mut fallback = false;

        let mut current_query = query.to_string();
        for hop in 0.. {
            let (hop_refs, hop_fallback) = self
                .single_pass_refs(&current_query, cfg.max_refs_per_hop, options, Some(hop))
                .await?;
            fallback |= hop_fallback;

            let mut new_refs = 0usize;
            for r in hop_refs {
                let key = (r.path.clone(), r.start_line, r.end_line);
                match by_key.get_mut(&key) {
                    Some(existing) => {
                        if r.score > existing.score {
                            existing.score = r.score;
                        }
                    }
                    None => {
                        order.push(key.clone());
                        by_key.insert(key, r);
                        new_refs += 1;
                    }
                }
            }
            hops.push(HopReport {
                hop,
                query: current_query.clone(),
                derived_query: None,
                new_refs,
            });

            if hop >= cfg.max_hops {
                break;
            }
            if cfg.early_stop && new_refs == 0 {
                break;
            }

            // Expand the best not-yet-expanded refs and derive the next
            // query from what came back. A per-ref expand failure aborts
            // only that expansion.
            let mut candidates: Vec<&MemoryRef> = order
                .iter()
                .filter(|key| !expanded_keys.contains(*key))
                .filter_map(|key| by_key.get(key))
                .collect();
            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.path.cmp(&b.path))
            });
            candidates.truncate(cfg.expand_top_k);

            let requests: Vec<ExpandRequestRef> =
                candidates.iter().map(|r| ExpandRequestRef::from(*r)).collect();
            for r in &candidates {
                expanded_keys.insert((r.path.clone(), r.start_line, r.end_line));
            }

            let expand_options = ExpandOptions {
                default_lines: cfg.default_lines,
                max_refs: cfg.expand_top_k,
                max_chars: cfg.max_chars_per_ref,
            };
            let outcome =
                self.expand
                    .expand_with_global_budget(&requests, &expand_options, &mut remaining);
            let expanded_text: String = outcome
                .results
                .iter()
                .filter_map(ExpandResult::window)
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            let derived = derive_query(&expanded_text, cfg.derived_query_max_terms);
            if derived.is_empty() {
                break;
            }
            if let Some(last) = hops.last_mut() {
                last.derived_query = Some(derived.clone());
            }
            // The original query is never discarded.
            current_query = format!("{query} {derived}");
        }

        let mut refs: Vec<MemoryRef> = order
            .into_iter()
            .filter_map(|key| by_key.remove(&key))
            .collect();
        refs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hop.cmp(&b.hop))
                .then_with(|| a.path.cmp(&b.path))
        });

        Ok(RefsOutcome {
            query: query.to_string(),
            refs,
            provider,
            model,
            disabled: false,
            error: None,
            fallback,
            recursive: Some(RecursiveReport {
                enabled: true,
                budget: cfg,
                hops,
                total_expanded_chars: cfg.max_total_expanded_chars.saturating_sub(remaining),
            }),
        })
    }

    async fn single_pass_refs(
        &self,
        query: &str,
        limit: usize,
        options: &RefsOptions,
        hop: Option<u32>,
    ) -> Result<(Vec<MemoryRef>, bool), String> {
        let pass = self.single_pass(query, limit, options.min_score).await?;
        let refs = pass
            .hits
            .into_iter()
            .map(|hit| {
                let preview = make_preview(&hit.snippet, options.preview_chars);
                MemoryRef {
                    path: hit.path,
                    start_line: hit.start_line,
                    end_line: hit.end_line,
                    score: hit.score,
                    source: hit.source,
                    preview,
                    session_id: hit.session_id,
                    hop,
                }
            })
            .filter(|r| !looks_like_blob(&r.preview))
            .take(limit)
            .collect();
        Ok((refs, pass.fallback))
    }

    async fn single_pass(
        &self,
        query: &str,
        limit: usize,
        min_score: Option<f64>,
    ) -> Result<SinglePass, String> {
        let mut semantic_hits: Vec<SearchHit> = Vec::new();
        if let Some(searcher) = &self.semantic {
            let semantic_query = SemanticQuery {
                query: query.to_string(),
                max_results: limit,
                min_score,
            };
            match searcher.search(&semantic_query).await {
                Ok(hits) => semantic_hits.extend(hits.into_iter().map(|hit| SearchHit {
                    source: Some(source_for_path(&hit.path)),
                    path: hit.path,
                    start_line: hit.start_line,
                    end_line: hit.end_line,
                    score: hit.score,
                    snippet: hit.snippet,
                    session_id: hit.session_id,
                })),
                Err(SearcherError::Disabled(message) | SearcherError::Failed(message)) => {
                    return Err(message);
                }
            }
        }

        let mut lexical_hits: Vec<SearchHit> = Vec::new();
        let mut fallback = false;
        if let Some(engine) = &self.lexical {
            let search_options = SearchOptions {
                max_results: limit,
                min_score,
                ..SearchOptions::default()
            };
            let outcome = engine
                .search(query, &search_options)
                .await
                .map_err(|err| err.to_string())?;
            fallback = outcome.search_path == SearchPath::Fallback;
            lexical_hits.extend(outcome.results.into_iter().map(|hit| SearchHit {
                path: hit.path,
                start_line: hit.line_number,
                end_line: hit.line_number,
                score: hit.match_score,
                snippet: hit.snippet,
                source: Some(RefSource::Sessions),
                session_id: Some(hit.session_id),
            }));
        }

        Ok(SinglePass {
            hits: interleave(semantic_hits, lexical_hits, limit),
            fallback,
        })
    }
}

struct SinglePass {
    hits: Vec<SearchHit>,
    fallback: bool,
}

fn source_for_path(path: &str) -> RefSource {
    if path.starts_with("sessions/") {
        RefSource::Sessions
    } else {
        RefSource::Memory
    }
}

/// Round-robin merge of two per-source rankings, deduplicating on
/// `(path, start, end)`.
fn interleave(semantic: Vec<SearchHit>, lexical: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    let mut out = Vec::new();
    let mut seen: HashSet<(String, usize, usize)> = HashSet::new();
    let mut a = semantic.into_iter();
    let mut b = lexical.into_iter();
    loop {
        let mut advanced = false;
        for next in [a.next(), b.next()] {
            if let Some(hit) = next {
                advanced = true;
                if seen.insert((hit.path.clone(), hit.start_line, hit.end_line)) {
                    out.push(hit);
                }
            }
        }
        if !advanced || out.len() >= limit {
            break;
        }
    }
    out.truncate(limit);
    out
}
