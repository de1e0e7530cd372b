//! Parameter sweep: enumerate the grid, run one suite per cell, pick the
//! best cell by the ordered objective.

use crate::report::{SuiteConfig, SuiteReport, SweepBest};
use serde::{Deserialize, Serialize};

/// Ordered objective, documented in the report for reproducibility.
pub const OBJECTIVE: &str =
    "max passRate, then min tokens.recursiveRefs.mean, then min latencyMs.recursiveRefs.p95";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepGrid {
    pub max_hops: Vec<u32>,
    pub expand_top_k: Vec<usize>,
    pub default_lines: Vec<usize>,
    pub max_total_expanded_chars: Vec<usize>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            max_hops: vec![0, 1, 2],
            expand_top_k: vec![2, 4],
            default_lines: vec![20, 60],
            max_total_expanded_chars: vec![8_000, 12_000],
        }
    }
}

impl SweepGrid {
    /// Cartesian product in a fixed order, optionally truncated. The order
    /// is what makes `--resume` meaningful across runs with different
    /// `--max-configs`.
    #[must_use]
    pub fn enumerate(&self, max_configs: Option<usize>) -> Vec<SuiteConfig> {
        let mut out = Vec::new();
        for &max_hops in &self.max_hops {
            for &expand_top_k in &self.expand_top_k {
                for &default_lines in &self.default_lines {
                    for &max_total_expanded_chars in &self.max_total_expanded_chars {
                        out.push(SuiteConfig {
                            max_hops,
                            expand_top_k,
                            default_lines,
                            max_total_expanded_chars,
                        });
                    }
                }
            }
        }
        if let Some(cap) = max_configs {
            out.truncate(cap);
        }
        out
    }
}

/// Pick the winning suite: pass rate first, then mean recursive tokens,
/// then p95 recursive latency. Suites that never ran the recursive mode
/// rank behind those that did on the tie-breakers.
#[must_use]
pub fn select_best(suites: &[SuiteReport]) -> Option<SweepBest> {
    let mut best: Option<SweepBest> = None;
    for suite in suites {
        let rec_tokens_mean = suite
            .tokens
            .get("recursiveRefs")
            .map_or(f64::INFINITY, |s| s.mean);
        let rec_latency_p95 = suite
            .latency_ms
            .get("recursiveRefs")
            .map_or(f64::INFINITY, |s| s.p95);
        let candidate = SweepBest {
            cfg: suite.config,
            pass_rate: suite.pass_rate,
            rec_tokens_mean,
            rec_latency_p95,
        };
        let better = match &best {
            None => true,
            Some(current) => {
                if candidate.pass_rate != current.pass_rate {
                    candidate.pass_rate > current.pass_rate
                } else if candidate.rec_tokens_mean != current.rec_tokens_mean {
                    candidate.rec_tokens_mean < current.rec_tokens_mean
                } else {
                    candidate.rec_latency_p95 < current.rec_latency_p95
                }
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SeriesStats;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn suite(pass_rate: f64, tokens_mean: f64, latency_p95: f64, hops: u32) -> SuiteReport {
        let stats = |mean: f64, p95: f64| SeriesStats {
            n: 1,
            mean,
            median: mean,
            p95,
        };
        SuiteReport {
            label: format!("hops={hops}"),
            config: SuiteConfig {
                max_hops: hops,
                ..SuiteConfig::default()
            },
            pass_rate,
            tokens: BTreeMap::from([(
                "recursiveRefs".to_string(),
                stats(tokens_mean, tokens_mean),
            )]),
            latency_ms: BTreeMap::from([(
                "recursiveRefs".to_string(),
                stats(latency_p95, latency_p95),
            )]),
            cases: Vec::new(),
        }
    }

    #[test]
    fn grid_enumeration_is_deterministic_and_bounded() {
        let grid = SweepGrid::default();
        let all = grid.enumerate(None);
        assert_eq!(all.len(), 24);
        let capped = grid.enumerate(Some(5));
        assert_eq!(capped.len(), 5);
        assert_eq!(&all[..5], &capped[..]);
    }

    #[test]
    fn pass_rate_dominates_the_objective() {
        let suites = vec![
            suite(0.8, 100.0, 5.0, 0),
            suite(0.9, 900.0, 50.0, 1),
            suite(0.9, 400.0, 80.0, 2),
        ];
        let best = select_best(&suites).expect("best");
        assert_eq!(best.pass_rate, 0.9);
        assert_eq!(best.rec_tokens_mean, 400.0);
        assert_eq!(best.cfg.max_hops, 2);
    }

    #[test]
    fn latency_breaks_token_ties() {
        let suites = vec![suite(0.9, 400.0, 80.0, 1), suite(0.9, 400.0, 20.0, 2)];
        let best = select_best(&suites).expect("best");
        assert_eq!(best.cfg.max_hops, 2);
        assert_eq!(best.rec_latency_p95, 20.0);
    }
}
