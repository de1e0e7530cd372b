//! Tool dispatch: the JSON shaping behind each MCP operation.
//!
//! Field names here are compatibility-sensitive; clients match on them
//! verbatim. Every operation returns structured JSON and never lets an
//! error escape as a panic; `disabled` distinguishes a missing capability
//! from an empty result set.

use crate::hooks::{HookContext, HookRegistry};
use crate::workspace::Workspace;
use anyhow::Result;
use recall_protocol::{defaults, ExpandRequestRef, RecursiveConfig};
use recall_refs::{ExpandOptions, RefsOptions};
use recall_search::SearchOptions;
use serde_json::{json, Value};

pub async fn memory_search(
    workspace: &Workspace,
    query: &str,
    max_results: Option<usize>,
    min_score: Option<f64>,
) -> Result<Value> {
    let limit = max_results.unwrap_or(defaults::MAX_RESULTS).max(1);
    let outcome = workspace
        .orchestrator()
        .search_hits(query, limit, min_score)
        .await;

    let mut value = json!({
        "results": outcome.results,
        "provider": outcome.provider,
        "model": outcome.model,
    });
    if outcome.fallback {
        value["fallback"] = json!(true);
    }
    if outcome.disabled {
        value["disabled"] = json!(true);
        value["error"] = json!(outcome.error);
    }
    Ok(value)
}

#[allow(clippy::too_many_arguments)]
pub async fn memory_search_refs(
    workspace: &Workspace,
    hooks: &HookRegistry,
    query: &str,
    max_results: Option<usize>,
    min_score: Option<f64>,
    preview_chars: Option<usize>,
    recursive: Option<RecursiveConfig>,
) -> Result<Value> {
    let options = RefsOptions {
        max_results: max_results.unwrap_or(defaults::MAX_RESULTS).max(1),
        min_score,
        preview_chars: preview_chars.unwrap_or(defaults::PREVIEW_CHARS).max(16),
        recursive,
    };
    let outcome = workspace.orchestrator().search_refs(query, &options).await;

    let mut value = json!({
        "query": outcome.query,
        "refs": outcome.refs,
        "provider": outcome.provider,
        "model": outcome.model,
    });
    if outcome.fallback {
        value["fallback"] = json!(true);
    }
    if outcome.disabled {
        value["disabled"] = json!(true);
        value["error"] = json!(outcome.error);
    }
    if let Some(recursive) = &outcome.recursive {
        value["recursive"] = serde_json::to_value(recursive)?;
    }

    let context = hooks
        .run_search_refs_post(HookContext {
            output: value,
            ..HookContext::default()
        })
        .await;
    let mut value = context.output;
    if let Some(augmented) = context.augmented_refs {
        value["refs"] = serde_json::to_value(augmented)?;
    }
    Ok(value)
}

pub fn memory_get(
    workspace: &Workspace,
    path: &str,
    from: Option<usize>,
    lines: Option<usize>,
) -> Result<Value> {
    let request = ExpandRequestRef {
        path: path.to_string(),
        from,
        lines,
        ..ExpandRequestRef::default()
    };
    let options = ExpandOptions {
        default_lines: defaults::EXPAND_DEFAULT_LINES,
        max_refs: 1,
        max_chars: defaults::MAX_CHARS_PER_REF,
    };
    let outcome = workspace.expand_engine().expand(&[request], &options);
    match outcome.results.into_iter().next() {
        Some(recall_protocol::ExpandResult::Window(window)) => Ok(json!(window)),
        Some(recall_protocol::ExpandResult::Failure(failure)) => Ok(json!({
            "path": failure.path,
            "error": failure.error,
        })),
        None => Ok(json!({ "path": path, "error": "nothing expanded" })),
    }
}

pub async fn memory_expand(
    workspace: &Workspace,
    hooks: &HookRegistry,
    refs: Vec<ExpandRequestRef>,
    default_lines: Option<usize>,
    max_refs: Option<usize>,
    max_chars: Option<usize>,
) -> Result<Value> {
    let options = ExpandOptions {
        default_lines: default_lines.unwrap_or(defaults::EXPAND_DEFAULT_LINES),
        max_refs: max_refs.unwrap_or(defaults::MAX_REFS),
        max_chars: max_chars.unwrap_or(defaults::MAX_CHARS_PER_REF),
    };
    let outcome = workspace.expand_engine().expand(&refs, &options);

    let value = json!({
        "results": outcome.results,
        "budget": outcome.budget,
    });

    let context = hooks
        .run_expand_post(HookContext {
            output: value,
            ..HookContext::default()
        })
        .await;
    let mut value = context.output;
    if let Some(augmented) = context.augmented_expanded {
        value["results"] = serde_json::to_value(augmented)?;
    }
    Ok(value)
}

pub async fn rlm_search(
    workspace: &Workspace,
    query: &str,
    max_results: Option<usize>,
) -> Result<Value> {
    let options = SearchOptions {
        max_results: max_results.unwrap_or(defaults::MAX_RESULTS).max(1),
        temporal_filter: workspace.temporal_filter_for(query),
        min_score: None,
    };
    let outcome = workspace.rlm_engine().search(query, &options).await?;

    Ok(json!({
        "results": outcome.results,
        "provider": "rlm",
        "model": crate::workspace::RLM_MODEL,
        "meta": {
            "timings": {
                "queryTimeMs": outcome.query_time_ms,
                "totalTimeMs": outcome.total_time_ms,
            },
            "searchPath": outcome.search_path,
            "candidatesFound": outcome.candidates_found,
            "sessionsScanned": outcome.sessions_scanned,
            "rootFingerprint": workspace.root_fingerprint(),
        },
    }))
}

pub async fn rlm_search_refs(
    workspace: &Workspace,
    query: &str,
    max_results: Option<usize>,
    preview_chars: Option<usize>,
) -> Result<Value> {
    let limit = max_results.unwrap_or(defaults::MAX_RESULTS).max(1);
    let preview_chars = preview_chars.unwrap_or(defaults::PREVIEW_CHARS).max(16);
    let options = SearchOptions {
        max_results: limit,
        temporal_filter: workspace.temporal_filter_for(query),
        min_score: None,
    };
    let outcome = workspace.rlm_engine().search(query, &options).await?;

    let refs: Vec<recall_protocol::MemoryRef> = outcome
        .results
        .iter()
        .map(|hit| recall_protocol::MemoryRef {
            path: hit.path.clone(),
            start_line: hit.line_number,
            end_line: hit.line_number,
            score: hit.match_score,
            source: Some(recall_protocol::RefSource::Sessions),
            preview: recall_refs::make_preview(&hit.snippet, preview_chars),
            session_id: Some(hit.session_id.clone()),
            hop: None,
        })
        .filter(|r| !recall_refs::looks_like_blob(&r.preview))
        .take(limit)
        .collect();

    Ok(json!({
        "query": query,
        "refs": refs,
        "provider": "rlm",
        "model": crate::workspace::RLM_MODEL,
        "meta": {
            "timings": {
                "queryTimeMs": outcome.query_time_ms,
                "totalTimeMs": outcome.total_time_ms,
            },
            "searchPath": outcome.search_path,
        },
    }))
}

pub fn rlm_expand(
    workspace: &Workspace,
    refs: Vec<ExpandRequestRef>,
    default_lines: Option<usize>,
    max_refs: Option<usize>,
    max_chars: Option<usize>,
) -> Result<Value> {
    let options = ExpandOptions {
        default_lines: default_lines.unwrap_or(defaults::EXPAND_DEFAULT_LINES),
        max_refs: max_refs.unwrap_or(defaults::MAX_REFS),
        max_chars: max_chars.unwrap_or(defaults::MAX_CHARS_PER_REF),
    };
    let outcome = workspace.expand_engine().expand(&refs, &options);
    Ok(json!({ "results": outcome.results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookContext as Ctx, HOOK_SEARCH_REFS_POST};
    use recall_indexer::IndexMaintainer;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        workspace: Workspace,
        maintainer: IndexMaintainer,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("sessions")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("memory")).expect("mkdir");
        let workspace = Workspace::new(dir.path());
        let maintainer = IndexMaintainer::new(
            dir.path().join("memory/inverted-index.json"),
            dir.path().join("sessions"),
        );
        Fixture {
            _dir: dir,
            workspace,
            maintainer,
        }
    }

    fn write_session(root: &Path, session_id: &str, texts: &[&str]) {
        let path = root.join("sessions").join(format!("{session_id}.jsonl"));
        let mut file = std::fs::File::create(path).expect("create");
        for text in texts {
            writeln!(
                file,
                r#"{{"type":"message","timestamp":"2026-07-01T10:00:00Z","message":{{"role":"user","content":"{text}"}}}}"#
            )
            .expect("write");
        }
    }

    #[tokio::test]
    async fn rlm_search_reports_path_and_timings() {
        let fx = fixture();
        write_session(
            fx.workspace.root(),
            "s1",
            &["the glicko rating pipeline needs work"],
        );
        fx.maintainer.build_index().await.expect("build");

        let value = rlm_search(&fx.workspace, "glicko rating", None)
            .await
            .expect("search");
        assert_eq!(value["provider"], "rlm");
        assert_eq!(value["meta"]["searchPath"], "index");
        assert!(value["results"].as_array().expect("array").len() > 0);
        assert!(value["meta"]["timings"]["totalTimeMs"].is_number());
    }

    #[tokio::test]
    async fn rlm_refs_point_into_session_files() {
        let fx = fixture();
        write_session(fx.workspace.root(), "s1", &["docker compose networking"]);
        fx.maintainer.build_index().await.expect("build");

        let value = rlm_search_refs(&fx.workspace, "docker compose", None, None)
            .await
            .expect("refs");
        let refs = value["refs"].as_array().expect("refs");
        assert!(!refs.is_empty());
        assert_eq!(refs[0]["path"], "sessions/s1.jsonl");
        assert_eq!(refs[0]["startLine"], 1);
        assert_eq!(refs[0]["source"], "sessions");
    }

    #[tokio::test]
    async fn refs_round_trip_through_expand() {
        let fx = fixture();
        write_session(fx.workspace.root(), "s1", &["expandable transcript body"]);
        fx.maintainer.build_index().await.expect("build");

        let refs_value = rlm_search_refs(&fx.workspace, "expandable transcript", None, None)
            .await
            .expect("refs");
        let refs: Vec<ExpandRequestRef> =
            serde_json::from_value(refs_value["refs"].clone()).expect("parse refs");

        let expanded = rlm_expand(&fx.workspace, refs, None, None, None).expect("expand");
        let text = expanded["results"][0]["text"].as_str().expect("text");
        assert!(text.contains("expandable transcript body"));
    }

    #[tokio::test]
    async fn memory_get_reads_a_window() {
        let fx = fixture();
        std::fs::write(
            fx.workspace.root().join("memory/notes.md"),
            "one\ntwo\nthree\n",
        )
        .expect("write");

        let value = memory_get(&fx.workspace, "memory/notes.md", Some(2), Some(2)).expect("get");
        assert_eq!(value["from"], 2);
        assert_eq!(value["lines"], 2);
        assert_eq!(value["text"], "two\nthree");
    }

    #[tokio::test]
    async fn memory_get_rejects_traversal() {
        let fx = fixture();
        let value = memory_get(&fx.workspace, "../outside.md", None, None).expect("get");
        assert!(value["error"].as_str().expect("error").contains("escapes"));
    }

    #[tokio::test]
    async fn memory_expand_reports_budget_and_failures() {
        let fx = fixture();
        std::fs::write(fx.workspace.root().join("memory/a.md"), "alpha\n").expect("write");

        let refs = vec![
            ExpandRequestRef {
                path: "memory/a.md".to_string(),
                ..ExpandRequestRef::default()
            },
            ExpandRequestRef {
                path: "memory/missing.md".to_string(),
                ..ExpandRequestRef::default()
            },
        ];
        let hooks = HookRegistry::new();
        let value = memory_expand(&fx.workspace, &hooks, refs, None, Some(4), None)
            .await
            .expect("expand");

        assert_eq!(value["budget"]["maxRefs"], 4);
        assert_eq!(value["budget"]["defaultLines"], 60);
        assert_eq!(value["budget"]["maxChars"], 8000);
        let results = value["results"].as_array().expect("results");
        assert_eq!(results[0]["text"], "alpha");
        assert!(results[1]["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn search_refs_hook_can_replace_refs() {
        let fx = fixture();
        write_session(fx.workspace.root(), "s1", &["hooked content body"]);
        fx.maintainer.build_index().await.expect("build");

        let mut hooks = HookRegistry::new();
        hooks.register(
            HOOK_SEARCH_REFS_POST,
            Arc::new(|mut ctx: Ctx| {
                Box::pin(async move {
                    ctx.augmented_refs = Some(vec![recall_protocol::MemoryRef {
                        path: "memory/injected.md".to_string(),
                        start_line: 1,
                        end_line: 1,
                        score: 9.9,
                        source: Some(recall_protocol::RefSource::Memory),
                        preview: "injected".to_string(),
                        session_id: None,
                        hop: None,
                    }]);
                    ctx
                })
            }),
        );

        let value = memory_search_refs(
            &fx.workspace,
            &hooks,
            "hooked content",
            None,
            None,
            None,
            None,
        )
        .await
        .expect("refs");

        let refs = value["refs"].as_array().expect("refs");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0]["path"], "memory/injected.md");
    }

    #[tokio::test]
    async fn lexical_only_workspace_is_not_disabled() {
        let fx = fixture();
        write_session(fx.workspace.root(), "s1", &["plain lexical body"]);
        fx.maintainer.build_index().await.expect("build");

        let value = memory_search(&fx.workspace, "lexical body", None, None)
            .await
            .expect("search");
        assert!(value.get("disabled").is_none());
        assert_eq!(value["provider"], "lexical");
    }
}
