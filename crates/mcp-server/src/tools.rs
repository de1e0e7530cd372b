//! MCP tool surface.
//!
//! Thin wrappers: each `#[tool]` parses its request, delegates to the
//! dispatch layer, and serialises the JSON result. All failures come back
//! as structured tool errors, never as transport-level faults.

use crate::dispatch;
use crate::hooks::HookRegistry;
use crate::workspace::Workspace;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use recall_protocol::{ExpandRequestRef, RecursiveConfig};
use serde::Deserialize;
use std::future::Future;

#[derive(Clone)]
pub struct RecallService {
    workspace: Workspace,
    hooks: HookRegistry,
    tool_router: ToolRouter<Self>,
}

impl RecallService {
    pub fn new(workspace: Workspace, hooks: HookRegistry) -> Self {
        Self {
            workspace,
            hooks,
            tool_router: Self::tool_router(),
        }
    }

    fn reply(value: anyhow::Result<serde_json::Value>) -> Result<CallToolResult, McpError> {
        match value {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(
                serde_json::to_string(&value).unwrap_or_default(),
            )])),
            Err(err) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Error: {err}"
            ))])),
        }
    }
}

#[tool_handler]
impl ServerHandler for RecallService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Reference-first retrieval over conversational memory. Use 'memory_search_refs' \
                 to get compact refs, 'memory_expand' to read the windows they point at, and the \
                 'rlm_*' variants for indexed transcript search."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Tool Input Schemas
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MemorySearchRequest {
    #[schemars(description = "Natural-language query")]
    pub query: String,
    #[schemars(description = "Maximum results to return (default 10)")]
    pub max_results: Option<usize>,
    #[schemars(description = "Drop results scoring below this")]
    pub min_score: Option<f64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MemorySearchRefsRequest {
    #[schemars(description = "Natural-language query")]
    pub query: String,
    #[schemars(description = "Maximum refs to return (default 10)")]
    pub max_results: Option<usize>,
    #[schemars(description = "Drop results scoring below this")]
    pub min_score: Option<f64>,
    #[schemars(description = "Preview length in chars (default 140)")]
    pub preview_chars: Option<usize>,
    #[schemars(description = "Multi-hop retrieval budgets; omit for a single pass")]
    pub recursive: Option<RecursiveConfig>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MemoryGetRequest {
    #[schemars(description = "Workspace-relative file path")]
    pub path: String,
    #[schemars(description = "1-based first line (default 1)")]
    pub from: Option<usize>,
    #[schemars(description = "Window height in lines (default 60)")]
    pub lines: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MemoryExpandRequest {
    #[schemars(description = "Refs to expand: {path, startLine?, endLine?, from?, lines?}")]
    pub refs: Vec<ExpandRequestRef>,
    #[schemars(description = "Window height when a ref has no range (default 60)")]
    pub default_lines: Option<usize>,
    #[schemars(description = "How many refs to expand (default 2)")]
    pub max_refs: Option<usize>,
    #[schemars(description = "Per-ref char budget (default 8000)")]
    pub max_chars: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RlmSearchRequest {
    #[schemars(description = "Query; temporal phrases like 'yesterday' are honoured")]
    pub query: String,
    #[schemars(description = "Maximum results to return (default 10)")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RlmSearchRefsRequest {
    #[schemars(description = "Query; temporal phrases like 'yesterday' are honoured")]
    pub query: String,
    #[schemars(description = "Maximum refs to return (default 10)")]
    pub max_results: Option<usize>,
    #[schemars(description = "Preview length in chars (default 140)")]
    pub preview_chars: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RlmExpandRequest {
    #[schemars(description = "Refs to expand")]
    pub refs: Vec<ExpandRequestRef>,
    pub default_lines: Option<usize>,
    pub max_refs: Option<usize>,
    pub max_chars: Option<usize>,
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl RecallService {
    #[tool(
        description = "Search workspace memory and transcripts. Returns snippet-level results with scores."
    )]
    pub async fn memory_search(
        &self,
        Parameters(request): Parameters<MemorySearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(
            dispatch::memory_search(
                &self.workspace,
                &request.query,
                request.max_results,
                request.min_score,
            )
            .await,
        )
    }

    #[tool(
        description = "Search and return compact refs (path, line range, preview) instead of full snippets. Set 'recursive' for bounded multi-hop retrieval."
    )]
    pub async fn memory_search_refs(
        &self,
        Parameters(request): Parameters<MemorySearchRefsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(
            dispatch::memory_search_refs(
                &self.workspace,
                &self.hooks,
                &request.query,
                request.max_results,
                request.min_score,
                request.preview_chars,
                request.recursive,
            )
            .await,
        )
    }

    #[tool(description = "Read a bounded window of a workspace file by line range.")]
    pub async fn memory_get(
        &self,
        Parameters(request): Parameters<MemoryGetRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(dispatch::memory_get(
            &self.workspace,
            &request.path,
            request.from,
            request.lines,
        ))
    }

    #[tool(
        description = "Expand refs into bounded text windows. Budgets are reported, never fatal."
    )]
    pub async fn memory_expand(
        &self,
        Parameters(request): Parameters<MemoryExpandRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(
            dispatch::memory_expand(
                &self.workspace,
                &self.hooks,
                request.refs,
                request.default_lines,
                request.max_refs,
                request.max_chars,
            )
            .await,
        )
    }

    #[tool(
        description = "Indexed transcript search via the inverted index (three-tier pipeline with full-scan fallback)."
    )]
    pub async fn rlm_search(
        &self,
        Parameters(request): Parameters<RlmSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(
            dispatch::rlm_search(&self.workspace, &request.query, request.max_results).await,
        )
    }

    #[tool(description = "Indexed transcript search returning refs into session files.")]
    pub async fn rlm_search_refs(
        &self,
        Parameters(request): Parameters<RlmSearchRefsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(
            dispatch::rlm_search_refs(
                &self.workspace,
                &request.query,
                request.max_results,
                request.preview_chars,
            )
            .await,
        )
    }

    #[tool(description = "Expand transcript refs into bounded windows.")]
    pub async fn rlm_expand(
        &self,
        Parameters(request): Parameters<RlmExpandRequest>,
    ) -> Result<CallToolResult, McpError> {
        Self::reply(dispatch::rlm_expand(
            &self.workspace,
            request.refs,
            request.default_lines,
            request.max_refs,
            request.max_chars,
        ))
    }
}
