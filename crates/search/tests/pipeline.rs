//! End-to-end laws for the three-tier pipeline and its fallback.

use recall_indexer::IndexMaintainer;
use recall_search::{parse_temporal_phrase, SearchOptions, SearchPath, TranscriptSearch};
use std::io::Write;
use std::path::{Path, PathBuf};

struct Fixture {
    _dir: tempfile::TempDir,
    maintainer: IndexMaintainer,
    search: TranscriptSearch,
}

fn fixture() -> Fixture {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let sessions = dir.path().join("sessions");
    std::fs::create_dir_all(&sessions).expect("mkdir");
    let index_path = dir.path().join("inverted-index.json");
    let maintainer = IndexMaintainer::new(&index_path, &sessions);
    let search = TranscriptSearch::new(&index_path, &sessions);
    Fixture {
        _dir: dir,
        maintainer,
        search,
    }
}

fn write_session(dir: &Path, session_id: &str, date: &str, texts: &[&str]) -> PathBuf {
    let path = dir.join(format!("{session_id}.jsonl"));
    let mut file = std::fs::File::create(&path).expect("create session");
    for text in texts {
        writeln!(
            file,
            r#"{{"type":"message","timestamp":"{date}T10:00:00Z","message":{{"role":"user","content":"{text}"}}}}"#
        )
        .expect("write line");
    }
    path
}

#[tokio::test]
async fn indexed_query_finds_the_right_session() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "chess",
        "2026-07-01",
        &[
            "the glicko rating for the leaderboard needs recalibration",
            "we shipped the chess endgame tablebase",
        ],
    );
    write_session(
        fx.maintainer.sessions_dir(),
        "infra",
        "2026-07-02",
        &["kubernetes pod eviction storm in the deploy cluster"],
    );
    fx.maintainer.build_index().await.expect("build");

    let outcome = fx
        .search
        .search("glicko rating", &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(outcome.search_path, SearchPath::Index);
    assert!(!outcome.results.is_empty());
    assert_eq!(outcome.results[0].session_id, "chess");
    assert_eq!(outcome.results[0].path, "sessions/chess.jsonl");
    assert!(outcome.results[0].snippet.contains("glicko"));
}

#[tokio::test]
async fn missing_index_falls_back_to_full_scan() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "s1",
        "2026-07-01",
        &["the websocket gateway drops frames under load"],
    );

    let outcome = fx
        .search
        .search("websocket gateway", &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(outcome.search_path, SearchPath::Fallback);
    assert_eq!(outcome.results[0].session_id, "s1");
}

#[tokio::test]
async fn indexed_results_are_a_subset_of_fallback_results() {
    let fx = fixture();
    for (id, text) in [
        ("a", "glicko drift on the rating leaderboard"),
        ("b", "docker compose network flakes"),
        ("c", "rating recalculation for chess players"),
        ("d", "unrelated grocery list discussion"),
    ] {
        write_session(fx.maintainer.sessions_dir(), id, "2026-07-01", &[text]);
    }
    fx.maintainer.build_index().await.expect("build");

    let options = SearchOptions {
        max_results: 50,
        ..SearchOptions::default()
    };
    let indexed = fx
        .search
        .search("glicko rating", &options)
        .await
        .expect("indexed search");
    let fallback = fx
        .search
        .full_scan_blocking("glicko rating", &options)
        .expect("fallback search");

    assert_eq!(indexed.search_path, SearchPath::Index);
    let fallback_keys: Vec<(String, usize)> = fallback
        .results
        .iter()
        .map(|r| (r.session_id.clone(), r.line_number))
        .collect();
    for hit in &indexed.results {
        assert!(
            fallback_keys.contains(&(hit.session_id.clone(), hit.line_number)),
            "indexed hit {}:{} missing from fallback",
            hit.session_id,
            hit.line_number
        );
    }
    // No fallback-only hit outranks every indexed hit.
    let best_indexed = indexed
        .results
        .iter()
        .map(|r| r.match_score)
        .fold(f64::MIN, f64::max);
    for hit in &fallback.results {
        let in_indexed = indexed
            .results
            .iter()
            .any(|r| r.session_id == hit.session_id && r.line_number == hit.line_number);
        if !in_indexed {
            assert!(hit.match_score <= best_indexed);
        }
    }
}

#[tokio::test]
async fn unknown_vocabulary_uses_fallback_path() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "s1",
        "2026-07-01",
        &["plain discussion about deployments"],
    );
    fx.maintainer.build_index().await.expect("build");

    let outcome = fx
        .search
        .search("zzyqx-unseen-term", &SearchOptions::default())
        .await
        .expect("search");
    assert_eq!(outcome.search_path, SearchPath::Fallback);
}

#[tokio::test]
async fn temporal_filter_restricts_candidates() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "old",
        "2026-07-01",
        &["auth token refresh bug in the gateway"],
    );
    write_session(
        fx.maintainer.sessions_dir(),
        "new",
        "2026-07-14",
        &["auth token refresh bug reappeared"],
    );
    fx.maintainer.build_index().await.expect("build");

    let reference = chrono::NaiveDate::from_ymd_opt(2026, 7, 15).expect("date");
    let range = parse_temporal_phrase("what did we fix yesterday?", reference).expect("range");
    let options = SearchOptions {
        temporal_filter: Some(range),
        ..SearchOptions::default()
    };

    let outcome = fx
        .search
        .search("auth token refresh", &options)
        .await
        .expect("search");
    assert!(outcome.results.iter().all(|r| r.session_id == "new"));
    assert!(!outcome.results.is_empty());
}

#[tokio::test]
async fn session_missing_from_index_is_scanned_as_hybrid() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "indexed",
        "2026-07-01",
        &["tokenizer boundary handling discussion"],
    );
    fx.maintainer.build_index().await.expect("build");

    // Appears after the build; the index has no entry for it.
    write_session(
        fx.maintainer.sessions_dir(),
        "late",
        "2026-07-02",
        &["tokenizer regression in the new release"],
    );

    let outcome = fx
        .search
        .search("tokenizer", &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(outcome.search_path, SearchPath::Hybrid);
    let ids: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.session_id.as_str())
        .collect();
    assert!(ids.contains(&"indexed"));
    assert!(ids.contains(&"late"));
}

#[tokio::test]
async fn min_score_filters_weak_matches() {
    let fx = fixture();
    write_session(
        fx.maintainer.sessions_dir(),
        "s1",
        "2026-07-01",
        &["a passing mention of ratings"],
    );
    fx.maintainer.build_index().await.expect("build");

    let strict = SearchOptions {
        min_score: Some(1_000.0),
        ..SearchOptions::default()
    };
    let outcome = fx.search.search("ratings", &strict).await.expect("search");
    assert!(outcome.results.is_empty() || outcome.search_path == SearchPath::Fallback);
}
