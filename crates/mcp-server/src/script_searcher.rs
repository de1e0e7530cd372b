//! Child-process semantic searcher adapter.
//!
//! Some deployments delegate scoring to an out-of-process script. The core
//! treats it as a JSON-in/JSON-out black box: one line of request on
//! stdin, hits on stdout, a strict timeout, and a bounded output buffer.
//! Correctness never depends on the script being present; only latency
//! does, so every failure maps onto the `disabled` surface.

use recall_refs::{SearchFuture, SearcherError, SemanticHit, SemanticQuery, SemanticSearcher};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
/// Stdout larger than this fails the call rather than ballooning memory.
const MAX_STDOUT_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptHit {
    path: String,
    start_line: usize,
    end_line: usize,
    score: f64,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(default)]
    results: Vec<ScriptHit>,
}

pub struct ScriptSearcher {
    command: String,
    args: Vec<String>,
    model: String,
}

impl ScriptSearcher {
    pub fn new(command: impl Into<String>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args,
            model: model.into(),
        }
    }

    async fn invoke(&self, query: &SemanticQuery) -> Result<Vec<SemanticHit>, SearcherError> {
        let request = serde_json::json!({
            "query": query.query,
            "maxResults": query.max_results,
            "minScore": query.min_score,
        });

        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| SearcherError::Disabled(format!("spawn {}: {err}", self.command)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SearcherError::Failed("child stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SearcherError::Failed("child stdout unavailable".to_string()))?;

        let io = async {
            stdin
                .write_all(request.to_string().as_bytes())
                .await
                .map_err(|err| SearcherError::Failed(format!("write request: {err}")))?;
            stdin
                .write_all(b"\n")
                .await
                .map_err(|err| SearcherError::Failed(format!("write request: {err}")))?;
            drop(stdin);

            let mut buffer = Vec::new();
            let mut bounded = (&mut stdout).take(MAX_STDOUT_BYTES + 1);
            bounded
                .read_to_end(&mut buffer)
                .await
                .map_err(|err| SearcherError::Failed(format!("read response: {err}")))?;
            if buffer.len() as u64 > MAX_STDOUT_BYTES {
                return Err(SearcherError::Failed(format!(
                    "script output exceeded {MAX_STDOUT_BYTES} bytes"
                )));
            }
            let status = child
                .wait()
                .await
                .map_err(|err| SearcherError::Failed(format!("wait child: {err}")))?;
            if !status.success() {
                return Err(SearcherError::Failed(format!(
                    "script exited with {status}"
                )));
            }
            Ok(buffer)
        };

        let buffer = match timeout(SCRIPT_TIMEOUT, io).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(SearcherError::Failed(format!(
                    "script timed out after {SCRIPT_TIMEOUT:?}"
                )));
            }
        };

        let response: ScriptResponse = serde_json::from_slice(&buffer)
            .map_err(|err| SearcherError::Failed(format!("bad script output: {err}")))?;

        Ok(response
            .results
            .into_iter()
            .map(|hit| SemanticHit {
                path: hit.path,
                start_line: hit.start_line.max(1),
                end_line: hit.end_line.max(hit.start_line.max(1)),
                score: hit.score,
                snippet: hit.snippet,
                session_id: hit.session_id,
            })
            .collect())
    }
}

impl SemanticSearcher for ScriptSearcher {
    fn provider(&self) -> &str {
        "script"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn search<'a>(&'a self, query: &'a SemanticQuery) -> SearchFuture<'a> {
        Box::pin(self.invoke(query))
    }
}
