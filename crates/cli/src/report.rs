//! Report document: per-case records, aggregates, atomic checkpoints.

use anyhow::{Context as AnyhowContext, Result};
use recall_protocol::{MemoryRef, RecursiveReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Stable token proxy: exact tokenisation is out of scope.
#[must_use]
pub fn token_estimate(chars: usize) -> usize {
    chars.div_ceil(4)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SizeRecord {
    pub chars: usize,
    pub tokens: usize,
}

impl SizeRecord {
    #[must_use]
    pub fn from_chars(chars: usize) -> Self {
        Self {
            chars,
            tokens: token_estimate(chars),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub query: String,
    /// Output sizes keyed by mode name.
    pub sizes: BTreeMap<String, SizeRecord>,
    /// Latencies keyed by mode name, plus `total`.
    pub latency_ms: BTreeMap<String, u64>,
    pub counts: CaseCounts,
    pub ok: bool,
    pub ok_by_mode: BTreeMap<String, bool>,
    /// First three refs for qualitative review.
    pub top_refs: Vec<MemoryRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive_meta: Option<RecursiveReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseCounts {
    pub refs_returned: usize,
    pub expanded_requested: usize,
}

/// `{n, mean, median, p95}` over a numeric series.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SeriesStats {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
}

/// Nearest-rank percentile on ascending-sorted finite values:
/// `p95 = x[min(n-1, ceil(0.95*n)-1)]`.
#[must_use]
pub fn series_stats(values: &[f64]) -> SeriesStats {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = finite.len();
    if n == 0 {
        return SeriesStats::default();
    }
    let mean = finite.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    };
    let rank = ((0.95 * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    SeriesStats {
        n,
        mean,
        median,
        p95: finite[rank],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub label: String,
    pub config: SuiteConfig,
    pub pass_rate: f64,
    /// Per-mode aggregates for `tokens` and `latencyMs`.
    pub tokens: BTreeMap<String, SeriesStats>,
    pub latency_ms: BTreeMap<String, SeriesStats>,
    pub cases: Vec<CaseRecord>,
}

/// The swept knobs. Everything else stays at tool-surface defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuiteConfig {
    pub max_hops: u32,
    pub expand_top_k: usize,
    pub default_lines: usize,
    pub max_total_expanded_chars: usize,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            max_hops: recall_protocol::defaults::RECURSIVE_MAX_HOPS,
            expand_top_k: recall_protocol::defaults::EXPAND_TOP_K,
            default_lines: recall_protocol::defaults::RECURSIVE_DEFAULT_LINES,
            max_total_expanded_chars: recall_protocol::defaults::MAX_TOTAL_EXPANDED_CHARS,
        }
    }
}

impl SuiteConfig {
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "hops={},topk={},lines={},budget={}",
            self.max_hops, self.expand_top_k, self.default_lines, self.max_total_expanded_chars
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepBest {
    pub cfg: SuiteConfig,
    pub pass_rate: f64,
    pub rec_tokens_mean: f64,
    pub rec_latency_p95: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub grid: Vec<SuiteConfig>,
    pub objective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<SweepBest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: String,
    pub ground_truth: GroundTruthMeta,
    pub defaults: SuiteConfig,
    pub suites: Vec<SuiteReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepReport>,
}

impl Report {
    #[must_use]
    pub fn new(ground_truth: GroundTruthMeta) -> Self {
        Self {
            generated_at: iso_now(),
            ground_truth,
            defaults: SuiteConfig::default(),
            suites: Vec::new(),
            sweep: None,
        }
    }

    #[must_use]
    pub fn has_suite(&self, label: &str) -> bool {
        self.suites.iter().any(|suite| suite.label == label)
    }

    /// Rewrite the full document atomically: temp file, fsync, rename.
    pub fn checkpoint(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create report dir {}", parent.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            serde_json::to_writer_pretty(&mut file, self)?;
            file.flush()?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("rename report into {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read report {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("report {} is not valid JSON", path.display()))
    }
}

pub(crate) fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
