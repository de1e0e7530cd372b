//! Ground-truth suite runner.
//!
//! Each case runs through the requested modes; a case passes when any
//! expected substring shows up (case-insensitively) in any mode's textual
//! output. A single case blowing up is a case-level failure, never a
//! suite-level one.

use crate::report::{
    CaseCounts, CaseRecord, SeriesStats, SizeRecord, SuiteConfig, SuiteReport, series_stats,
};
use anyhow::{Context as AnyhowContext, Result};
use clap::ValueEnum;
use recall_protocol::{ExpandRequestRef, MemoryRef, RecursiveConfig};
use recall_refs::{ExpandEngine, ExpandOptions, FsStore, RefsOptions, RefsOrchestrator};
use recall_search::{SearchOptions, TranscriptSearch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    pub any_contains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths_like: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthCase {
    pub id: String,
    pub query: String,
    pub expect: Expectation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub cases: Vec<GroundTruthCase>,
}

impl GroundTruthFile {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read ground truth {}", path.display()))?;
        let file: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("ground truth {} is not valid JSON", path.display()))?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cases.is_empty() {
            anyhow::bail!("ground truth must contain at least one case");
        }
        for case in &self.cases {
            if case.id.trim().is_empty() {
                anyhow::bail!("ground truth case id must not be empty");
            }
            if case.query.trim().is_empty() {
                anyhow::bail!("ground truth case '{}' query must not be empty", case.id);
            }
            if case.expect.any_contains.iter().all(|s| s.trim().is_empty()) {
                anyhow::bail!(
                    "ground truth case '{}' anyContains must not be empty",
                    case.id
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Baseline,
    Refs,
    Expand,
    Recursive,
}

impl Mode {
    /// Report key for this mode. The recursive mode reports under
    /// `recursiveRefs` to keep it distinct from the plain refs pass.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Mode::Baseline => "baseline",
            Mode::Refs => "refs",
            Mode::Expand => "expand",
            Mode::Recursive => "recursiveRefs",
        }
    }

    #[must_use]
    pub fn all() -> Vec<Mode> {
        vec![Mode::Baseline, Mode::Refs, Mode::Expand, Mode::Recursive]
    }
}

/// Engines wired against one workspace root.
#[derive(Clone)]
pub struct Harness {
    engine: TranscriptSearch,
    orchestrator: RefsOrchestrator,
    expand: ExpandEngine,
}

impl Harness {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let expand = ExpandEngine::new(Arc::new(FsStore::new(&root)));
        let engine = TranscriptSearch::new(
            root.join("memory").join("inverted-index.json"),
            root.join("sessions"),
        );
        let orchestrator = RefsOrchestrator::new(expand.clone()).with_lexical(engine.clone());
        Self {
            engine,
            orchestrator,
            expand,
        }
    }

    pub async fn run_suite(
        &self,
        ground_truth: &GroundTruthFile,
        modes: &[Mode],
        config: SuiteConfig,
        label: String,
    ) -> SuiteReport {
        let mut cases = Vec::with_capacity(ground_truth.cases.len());
        for case in &ground_truth.cases {
            cases.push(self.run_case(case, modes, config).await);
        }

        let passed = cases.iter().filter(|c| c.ok).count();
        let pass_rate = if cases.is_empty() {
            0.0
        } else {
            passed as f64 / cases.len() as f64
        };

        let mut tokens: BTreeMap<String, SeriesStats> = BTreeMap::new();
        let mut latency: BTreeMap<String, SeriesStats> = BTreeMap::new();
        for mode in modes.iter().map(|m| m.key()).chain(["total"]) {
            let token_series: Vec<f64> = cases
                .iter()
                .filter_map(|c| c.sizes.get(mode).map(|s| s.tokens as f64))
                .collect();
            if !token_series.is_empty() {
                tokens.insert(mode.to_string(), series_stats(&token_series));
            }
            let latency_series: Vec<f64> = cases
                .iter()
                .filter_map(|c| c.latency_ms.get(mode).map(|v| *v as f64))
                .collect();
            if !latency_series.is_empty() {
                latency.insert(mode.to_string(), series_stats(&latency_series));
            }
        }

        SuiteReport {
            label,
            config,
            pass_rate,
            tokens,
            latency_ms: latency,
            cases,
        }
    }

    async fn run_case(
        &self,
        case: &GroundTruthCase,
        modes: &[Mode],
        config: SuiteConfig,
    ) -> CaseRecord {
        let mut record = CaseRecord {
            id: case.id.clone(),
            query: case.query.clone(),
            sizes: BTreeMap::new(),
            latency_ms: BTreeMap::new(),
            counts: CaseCounts::default(),
            ok: false,
            ok_by_mode: BTreeMap::new(),
            top_refs: Vec::new(),
            recursive_meta: None,
            error: None,
        };

        let mut refs_for_expand: Vec<MemoryRef> = Vec::new();
        let mut total_ms = 0u64;

        for mode in modes {
            let start = Instant::now();
            let output = match *mode {
                Mode::Baseline => self.run_baseline(case).await,
                Mode::Refs => {
                    self.run_refs(case, &mut record, &mut refs_for_expand)
                        .await
                }
                Mode::Expand => self.run_expand(&mut record, &refs_for_expand, config),
                Mode::Recursive => self.run_recursive(case, &mut record, config).await,
            };
            let elapsed = start.elapsed().as_millis() as u64;
            total_ms += elapsed;
            record.latency_ms.insert(mode.key().to_string(), elapsed);

            match output {
                Ok(text) => {
                    record
                        .sizes
                        .insert(mode.key().to_string(), SizeRecord::from_chars(text.chars().count()));
                    let passed = matches_expectation(&case.expect, &text);
                    record.ok_by_mode.insert(mode.key().to_string(), passed);
                    record.ok |= passed;
                }
                Err(err) => {
                    // Case-level failure only; the suite keeps going.
                    log::warn!("case {} mode {} failed: {err}", case.id, mode.key());
                    record.ok_by_mode.insert(mode.key().to_string(), false);
                    record.error = Some(err.to_string());
                }
            }
        }

        record.latency_ms.insert("total".to_string(), total_ms);
        record
    }

    async fn run_baseline(&self, case: &GroundTruthCase) -> Result<String> {
        let outcome = self
            .engine
            .search(&case.query, &SearchOptions::default())
            .await?;
        Ok(serde_json::to_string(&outcome.results)?)
    }

    async fn run_refs(
        &self,
        case: &GroundTruthCase,
        record: &mut CaseRecord,
        refs_for_expand: &mut Vec<MemoryRef>,
    ) -> Result<String> {
        let outcome = self
            .orchestrator
            .search_refs(&case.query, &RefsOptions::default())
            .await;
        if outcome.disabled {
            anyhow::bail!(outcome.error.unwrap_or_else(|| "search disabled".to_string()));
        }
        record.counts.refs_returned = outcome.refs.len();
        record.top_refs = outcome.refs.iter().take(3).cloned().collect();
        *refs_for_expand = outcome.refs.clone();
        Ok(serde_json::to_string(&outcome.refs)?)
    }

    fn run_expand(
        &self,
        record: &mut CaseRecord,
        refs: &[MemoryRef],
        config: SuiteConfig,
    ) -> Result<String> {
        let requests: Vec<ExpandRequestRef> = refs
            .iter()
            .take(config.expand_top_k)
            .map(ExpandRequestRef::from)
            .collect();
        record.counts.expanded_requested = requests.len();

        let options = ExpandOptions {
            default_lines: config.default_lines,
            max_refs: config.expand_top_k.max(1),
            max_chars: recall_protocol::defaults::MAX_CHARS_PER_REF,
        };
        let outcome = self.expand.expand(&requests, &options);
        let text: String = outcome
            .results
            .iter()
            .filter_map(recall_protocol::ExpandResult::window)
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }

    async fn run_recursive(
        &self,
        case: &GroundTruthCase,
        record: &mut CaseRecord,
        config: SuiteConfig,
    ) -> Result<String> {
        let recursive = RecursiveConfig {
            max_hops: config.max_hops,
            expand_top_k: config.expand_top_k,
            default_lines: config.default_lines,
            max_total_expanded_chars: config.max_total_expanded_chars,
            ..RecursiveConfig::default()
        };
        let outcome = self
            .orchestrator
            .search_refs(
                &case.query,
                &RefsOptions {
                    recursive: Some(recursive),
                    ..RefsOptions::default()
                },
            )
            .await;
        if outcome.disabled {
            anyhow::bail!(outcome.error.unwrap_or_else(|| "search disabled".to_string()));
        }
        record.recursive_meta = outcome.recursive.clone();
        if record.top_refs.is_empty() {
            record.top_refs = outcome.refs.iter().take(3).cloned().collect();
        }
        Ok(serde_json::to_string(&outcome.refs)?)
    }
}

/// Substring evidence, case-insensitive.
fn matches_expectation(expect: &Expectation, text: &str) -> bool {
    let haystack = text.to_lowercase();
    if expect
        .any_contains
        .iter()
        .any(|needle| !needle.trim().is_empty() && haystack.contains(&needle.to_lowercase()))
    {
        return true;
    }
    if let Some(patterns) = &expect.paths_like {
        return patterns
            .iter()
            .any(|pattern| !pattern.trim().is_empty() && haystack.contains(&pattern.to_lowercase()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expectation(needles: &[&str]) -> Expectation {
        Expectation {
            any_contains: needles.iter().map(ToString::to_string).collect(),
            paths_like: None,
        }
    }

    #[test]
    fn evidence_matching_is_case_insensitive() {
        let expect = expectation(&["Glicko"]);
        assert!(matches_expectation(&expect, "we tuned GLICKO today"));
        assert!(!matches_expectation(&expect, "nothing relevant"));
    }

    #[test]
    fn paths_like_counts_as_evidence() {
        let expect = Expectation {
            any_contains: vec!["unfindable".to_string()],
            paths_like: Some(vec!["sessions/abc".to_string()]),
        };
        assert!(matches_expectation(
            &expect,
            r#"[{"path":"sessions/abc.jsonl"}]"#
        ));
    }

    #[test]
    fn ground_truth_validation_rejects_empty() {
        let empty = GroundTruthFile::default();
        assert!(empty.validate().is_err());

        let unusable = GroundTruthFile {
            cases: vec![GroundTruthCase {
                id: "c1".to_string(),
                query: "q".to_string(),
                expect: expectation(&[""]),
            }],
            ..GroundTruthFile::default()
        };
        assert!(unusable.validate().is_err());
    }

    #[test]
    fn mode_keys_are_stable() {
        assert_eq!(Mode::Baseline.key(), "baseline");
        assert_eq!(Mode::Recursive.key(), "recursiveRefs");
    }
}
