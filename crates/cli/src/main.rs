use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use recall_cli::harness::Mode;
use recall_cli::{run_eval, usage};
use recall_indexer::{assess_staleness, IndexMaintainer, InvertedIndex};
use recall_search::{parse_temporal_phrase, SearchOptions, TranscriptSearch};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Reference-first retrieval over conversational memory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (contains sessions/ and memory/)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the evaluation harness over a ground-truth suite
    Eval {
        /// Ground-truth JSON file
        #[arg(long)]
        ground_truth: PathBuf,

        /// Report output path
        #[arg(long)]
        out: PathBuf,

        /// Modes to run (default: all)
        #[arg(long, value_enum, value_delimiter = ',')]
        modes: Vec<Mode>,

        /// Sweep the parameter grid instead of a single run
        #[arg(long)]
        sweep: bool,

        /// Bound the number of sweep cells
        #[arg(long)]
        max_configs: Option<usize>,

        /// Re-read an existing report and skip completed suites
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Inverted-index maintenance
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Search session transcripts
    Search {
        /// Search query (temporal phrases like "yesterday" are honoured)
        query: String,

        /// Maximum results to return
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Emit raw JSON instead of the readable listing
        #[arg(long)]
        json: bool,
    },

    /// Show search usage statistics
    Stats,
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Full rebuild over every transcript
    Build,

    /// Incrementally index one session transcript
    Update {
        session_id: String,
        session_file: PathBuf,
    },

    /// Report index freshness
    Status,
}

fn index_path(root: &Path) -> PathBuf {
    root.join("memory").join("inverted-index.json")
}

fn sessions_dir(root: &Path) -> PathBuf {
    root.join("sessions")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir().context("resolve current directory")?,
    };

    match cli.command {
        Commands::Eval {
            ground_truth,
            out,
            modes,
            sweep,
            max_configs,
            resume,
        } => {
            let modes = if modes.is_empty() { Mode::all() } else { modes };
            let report = run_eval(
                &root,
                &ground_truth,
                &out,
                &modes,
                sweep,
                max_configs,
                resume.as_deref(),
            )
            .await?;

            println!("Report written to {}", out.display());
            for suite in &report.suites {
                println!(
                    "  {}: pass rate {:.0}% over {} cases",
                    suite.label,
                    suite.pass_rate * 100.0,
                    suite.cases.len()
                );
            }
            if let Some(best) = report.sweep.as_ref().and_then(|s| s.best.as_ref()) {
                println!(
                    "Best cell: {} (pass rate {:.0}%)",
                    best.cfg.label(),
                    best.pass_rate * 100.0
                );
            }
        }

        Commands::Index { command } => {
            let maintainer = IndexMaintainer::new(index_path(&root), sessions_dir(&root));
            match command {
                IndexCommands::Build => {
                    let stats = maintainer.build_index().await?;
                    println!(
                        "Indexed {} sessions, {} messages, {} unique tokens in {} ms",
                        stats.sessions, stats.messages, stats.unique_tokens, stats.time_ms
                    );
                }
                IndexCommands::Update {
                    session_id,
                    session_file,
                } => {
                    let stats = maintainer.update_index(&session_id, &session_file).await?;
                    println!(
                        "Indexed {} new messages ({} tokens) in {} ms, watermark {}",
                        stats.messages_added,
                        stats.tokens_added,
                        stats.time_ms,
                        stats.last_indexed_line
                    );
                }
                IndexCommands::Status => {
                    let (index, corrupt) = match InvertedIndex::load(&index_path(&root)) {
                        Ok(index) => (index, false),
                        Err(_) => (None, true),
                    };
                    let assessment =
                        assess_staleness(index.as_ref(), corrupt, &sessions_dir(&root));
                    println!("{}", serde_json::to_string_pretty(&assessment)?);
                }
            }
        }

        Commands::Search { query, limit, json } => {
            let engine = TranscriptSearch::new(index_path(&root), sessions_dir(&root));
            let options = SearchOptions {
                max_results: limit,
                temporal_filter: parse_temporal_phrase(
                    &query,
                    chrono::Local::now().date_naive(),
                ),
                min_score: None,
            };
            let outcome = engine.search(&query, &options).await?;

            let log_path = root.join("memory").join("usage.log");
            if let Err(err) = usage::append(
                &log_path,
                &query,
                outcome.results.len(),
                outcome.sessions_scanned,
            ) {
                log::warn!("usage log append failed: {err}");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "{} results ({:?} path, {} ms)",
                    outcome.results.len(),
                    outcome.search_path,
                    outcome.total_time_ms
                );
                for (rank, hit) in outcome.results.iter().enumerate() {
                    println!(
                        "[{}] {}:{} (score {:.1}{})",
                        rank + 1,
                        hit.path,
                        hit.line_number,
                        hit.match_score,
                        hit.date
                            .as_deref()
                            .map(|d| format!(", {d}"))
                            .unwrap_or_default()
                    );
                    println!("    {}", hit.snippet.replace('\n', " "));
                }
            }
        }

        Commands::Stats => {
            let stats = usage::stats(&root.join("memory").join("usage.log"));
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
