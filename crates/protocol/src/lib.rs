//! Shared wire types for the recall workspace.
//!
//! Everything that crosses a tool-surface boundary (refs, expanded windows,
//! budgets, recursive metadata) lives here so the engine crates and the MCP
//! server agree on field names byte-for-byte.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod defaults;

/// Literal marker appended to a window that was cut by a char budget.
pub const TRUNCATION_MARKER: &str = "\n…TRUNCATED…";

/// Where a ref points to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RefSource {
    Sessions,
    Memory,
    State,
    #[serde(other)]
    Other,
}

/// Compact pointer into a memory file or session transcript.
///
/// Invariants: `1 <= start_line <= end_line`; `preview` is whitespace-normalised
/// and never longer than the `preview_chars` it was built with. `score` is only
/// comparable to other refs from the same query batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRef {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RefSource>,
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Which recursive hop first produced this ref. Absent outside recursion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop: Option<u32>,
}

/// A snippet-carrying search hit, as returned by `memory_search` and
/// `rlm_search` before the refs-first shaping is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RefSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Input shape for expansion: a ref, or a bare `{path, from, lines}` range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequestRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
}

impl From<&MemoryRef> for ExpandRequestRef {
    fn from(r: &MemoryRef) -> Self {
        Self {
            path: r.path.clone(),
            start_line: Some(r.start_line),
            end_line: Some(r.end_line),
            from: None,
            lines: None,
        }
    }
}

/// Bounded text window produced by the expand engine.
///
/// A truncated window ends with exactly one [`TRUNCATION_MARKER`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedWindow {
    pub path: String,
    pub from: usize,
    pub lines: usize,
    pub text: String,
}

/// Per-ref failure inside a batch expansion. Sibling refs still succeed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpandFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum ExpandResult {
    Window(ExpandedWindow),
    Failure(ExpandFailure),
}

impl ExpandResult {
    #[must_use]
    pub fn window(&self) -> Option<&ExpandedWindow> {
        match self {
            ExpandResult::Window(w) => Some(w),
            ExpandResult::Failure(_) => None,
        }
    }
}

/// Budgets echoed back by `memory_expand`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpandBudget {
    pub max_refs: usize,
    pub default_lines: usize,
    pub max_chars: usize,
}

impl Default for ExpandBudget {
    fn default() -> Self {
        Self {
            max_refs: defaults::MAX_REFS,
            default_lines: defaults::EXPAND_DEFAULT_LINES,
            max_chars: defaults::MAX_CHARS_PER_REF,
        }
    }
}

/// Knobs for the bounded multi-hop retrieval loop.
///
/// `max_hops = 0` degenerates to the non-recursive path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RecursiveConfig {
    pub enabled: bool,
    pub max_hops: u32,
    pub max_refs_per_hop: usize,
    pub expand_top_k: usize,
    pub default_lines: usize,
    pub max_chars_per_ref: usize,
    pub max_total_expanded_chars: usize,
    pub derived_query_max_terms: usize,
    pub early_stop: bool,
}

impl Default for RecursiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hops: defaults::RECURSIVE_MAX_HOPS,
            max_refs_per_hop: defaults::MAX_REFS_PER_HOP,
            expand_top_k: defaults::EXPAND_TOP_K,
            default_lines: defaults::RECURSIVE_DEFAULT_LINES,
            max_chars_per_ref: defaults::MAX_CHARS_PER_REF,
            max_total_expanded_chars: defaults::MAX_TOTAL_EXPANDED_CHARS,
            derived_query_max_terms: defaults::DERIVED_QUERY_MAX_TERMS,
            early_stop: true,
        }
    }
}

/// Per-hop record inside [`RecursiveReport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HopReport {
    pub hop: u32,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_query: Option<String>,
    pub new_refs: usize,
}

/// Metadata attached to a recursive `memory_search_refs` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecursiveReport {
    pub enabled: bool,
    pub budget: RecursiveConfig,
    pub hops: Vec<HopReport>,
    pub total_expanded_chars: usize,
}

/// Structured error surface. Exceptions never cross an operation boundary;
/// they become one of these (or a `disabled` flag) instead.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }
}

/// Cut `input` to at most `max_chars` characters, respecting char boundaries.
#[must_use]
pub fn truncate_to_chars(input: &str, max_chars: usize) -> &str {
    let max_chars = max_chars.max(1);
    let mut cut_byte = input.len();
    for (seen, (idx, _)) in input.char_indices().enumerate() {
        if seen == max_chars {
            cut_byte = idx;
            break;
        }
    }
    &input[..cut_byte]
}

/// Apply a char budget and append [`TRUNCATION_MARKER`] when the budget bit.
#[must_use]
pub fn apply_char_budget(input: &str, max_chars: usize) -> (String, bool) {
    if input.chars().count() <= max_chars {
        return (input.to_string(), false);
    }
    let mut out = truncate_to_chars(input, max_chars).to_string();
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_chars("héllo", 2), "hé");
        assert_eq!(truncate_to_chars("héllo", 10), "héllo");
        // Never returns an empty slice for a non-empty input.
        assert_eq!(truncate_to_chars("héllo", 0), "h");
    }

    #[test]
    fn char_budget_appends_single_marker() {
        let (out, truncated) = apply_char_budget(&"x".repeat(100), 10);
        assert!(truncated);
        assert_eq!(out.chars().count(), 10 + TRUNCATION_MARKER.chars().count());
        assert!(out.ends_with(TRUNCATION_MARKER));

        let (out, truncated) = apply_char_budget("short", 10);
        assert!(!truncated);
        assert_eq!(out, "short");
    }

    #[test]
    fn recursive_config_defaults_match_tool_surface() {
        let cfg = RecursiveConfig::default();
        assert_eq!(cfg.max_hops, 1);
        assert_eq!(cfg.max_refs_per_hop, 8);
        assert_eq!(cfg.expand_top_k, 2);
        assert_eq!(cfg.default_lines, 20);
        assert_eq!(cfg.max_total_expanded_chars, 12_000);
        assert_eq!(cfg.derived_query_max_terms, 12);
        assert!(cfg.early_stop);
    }

    #[test]
    fn ref_serialises_with_camel_case_names() {
        let r = MemoryRef {
            path: "memory/notes.md".to_string(),
            start_line: 3,
            end_line: 9,
            score: 1.5,
            source: Some(RefSource::Memory),
            preview: "notes".to_string(),
            session_id: None,
            hop: Some(1),
        };
        let value = serde_json::to_value(&r).expect("serialise ref");
        assert_eq!(value["startLine"], 3);
        assert_eq!(value["endLine"], 9);
        assert_eq!(value["source"], "memory");
        assert_eq!(value["hop"], 1);
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn expand_result_flattens_window_and_failure() {
        let ok = ExpandResult::Window(ExpandedWindow {
            path: "a.md".to_string(),
            from: 1,
            lines: 2,
            text: "hi".to_string(),
        });
        let value = serde_json::to_value(&ok).expect("serialise window");
        assert_eq!(value["from"], 1);
        assert!(value.get("error").is_none());

        let err = ExpandResult::Failure(ExpandFailure {
            path: "b.md".to_string(),
            error: "not found".to_string(),
        });
        let value = serde_json::to_value(&err).expect("serialise failure");
        assert_eq!(value["error"], "not found");
    }
}
