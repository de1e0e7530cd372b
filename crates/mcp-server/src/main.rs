//! Recall MCP server.
//!
//! ## Tools
//!
//! - `memory_search` - Snippet-level search over memory and transcripts
//! - `memory_search_refs` - Compact refs with optional multi-hop retrieval
//! - `memory_get` - Bounded file window (root-locked)
//! - `memory_expand` - Expand refs under char budgets
//! - `rlm_search` - Inverted-index transcript search
//! - `rlm_search_refs` - Same, returning refs
//! - `rlm_expand` - Expand transcript refs
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "recall": {
//!       "command": "recall-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use recall_indexer::{IndexMaintainer, IndexRefresher, RefresherConfig};
use rmcp::ServiceExt;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

mod dispatch;
mod hooks;
mod script_searcher;
mod tools;
mod workspace;

use hooks::HookRegistry;
use script_searcher::ScriptSearcher;
use tools::RecallService;
use workspace::Workspace;

fn print_help() {
    println!("Recall MCP server");
    println!();
    println!("Usage: recall-mcp [--version|--help]");
    println!();
    println!("Env:");
    println!("  RECALL_WORKSPACE       Workspace root (default: current directory)");
    println!("  RECALL_SEMANTIC_CMD    Optional semantic-searcher command line");
    println!("  RECALL_SEMANTIC_MODEL  Model label for the semantic searcher");
    println!("  RECALL_MCP_LOG         Set to 1 to enable stderr logging");
}

fn handle_cli_args() -> Option<i32> {
    let args: Vec<String> = env::args().skip(1).collect();
    for arg in &args {
        match arg.as_str() {
            // Some MCP clients unconditionally pass `--stdio`.
            "--stdio" | "stdio" => {}
            "--version" | "-V" => {
                println!("recall-mcp {}", env!("CARGO_PKG_VERSION"));
                return Some(0);
            }
            "--help" | "-h" => {
                print_help();
                return Some(0);
            }
            other => {
                // Be permissive: wrappers and transport selectors can add
                // args, and starting the server beats failing the toolchain.
                log::warn!("ignoring unknown argument {other}");
            }
        }
    }
    None
}

fn logging_enabled() -> bool {
    // Any non-MCP bytes on stdout break clients, and some clients merge
    // stderr into stdout. Default to silent unless explicitly enabled.
    env::var("RECALL_MCP_LOG")
        .ok()
        .map(|v| {
            let v = v.trim();
            !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
        })
        .unwrap_or(false)
}

fn workspace_root() -> PathBuf {
    env::var("RECALL_WORKSPACE")
        .map(PathBuf::from)
        .or_else(|_| env::current_dir())
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn build_workspace(root: PathBuf) -> Workspace {
    let workspace = Workspace::new(root);
    match env::var("RECALL_SEMANTIC_CMD") {
        Ok(command_line) if !command_line.trim().is_empty() => {
            let mut parts = command_line.split_whitespace().map(str::to_string);
            let Some(command) = parts.next() else {
                return workspace;
            };
            let model = env::var("RECALL_SEMANTIC_MODEL")
                .unwrap_or_else(|_| "script-v1".to_string());
            workspace.with_semantic(Arc::new(ScriptSearcher::new(
                command,
                parts.collect(),
                model,
            )))
        }
        _ => workspace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if logging_enabled() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Stderr)
            .init();
    }
    if let Some(code) = handle_cli_args() {
        std::process::exit(code);
    }

    let root = workspace_root();
    let workspace = build_workspace(root.clone());

    // Keep the index fresh while the server runs. The refresher is
    // best-effort; queries fall back to full scans without it.
    let sessions_dir = root.join("sessions");
    let _refresher = if sessions_dir.is_dir() {
        let maintainer = IndexMaintainer::new(Workspace::index_path_for(&root), sessions_dir);
        match IndexRefresher::start(maintainer, RefresherConfig::default()) {
            Ok(refresher) => Some(refresher),
            Err(err) => {
                log::warn!("index refresher unavailable: {err}");
                None
            }
        }
    } else {
        None
    };

    let service = RecallService::new(workspace, HookRegistry::new());
    let server = service.serve(rmcp::transport::stdio()).await?;
    server.waiting().await?;
    Ok(())
}
