//! Search usage log: one TSV line per query, plus a summary view.

use anyhow::{Context as AnyhowContext, Result};
use serde::Serialize;
use std::path::Path;

pub fn append(log_path: &Path, query: &str, results: usize, sessions_searched: usize) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let line = format!(
        "{}\tquery={}\tresults={results}\tsessions={sessions_searched}\n",
        crate::report::iso_now(),
        serde_json::to_string(query)?,
    );
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open usage log {}", log_path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_searches: usize,
    pub total_results: usize,
    pub first_used: Option<String>,
    pub last_used: Option<String>,
}

#[must_use]
pub fn stats(log_path: &Path) -> UsageStats {
    let Ok(raw) = std::fs::read_to_string(log_path) else {
        return UsageStats::default();
    };
    let mut out = UsageStats::default();
    for line in raw.lines() {
        let mut parts = line.split('\t');
        let Some(timestamp) = parts.next() else {
            continue;
        };
        out.total_searches += 1;
        if out.first_used.is_none() {
            out.first_used = Some(timestamp.to_string());
        }
        out.last_used = Some(timestamp.to_string());
        for part in parts {
            if let Some(count) = part.strip_prefix("results=") {
                out.total_results += count.parse::<usize>().unwrap_or(0);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_then_stats_round_trips() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let log = dir.path().join("memory").join("usage.log");

        append(&log, "glicko rating", 3, 7).expect("append");
        append(&log, "docker \"weird\tquery\"", 0, 2).expect("append");

        let stats = stats(&log);
        assert_eq!(stats.total_searches, 2);
        assert_eq!(stats.total_results, 3);
        assert!(stats.first_used.is_some());
    }

    #[test]
    fn missing_log_is_empty_stats() {
        let stats = stats(Path::new("/nonexistent/usage.log"));
        assert_eq!(stats, UsageStats::default());
    }
}
