//! Session transcript access.
//!
//! Transcripts are append-only line-delimited JSON under `sessions/`. Each
//! line is a self-contained record; only `type == "message"` records with a
//! `user` or `assistant` role are searchable. Malformed lines are skipped,
//! never fatal.

use crate::{IndexerError, Result};
use serde::Deserialize;
use std::path::Path;

/// One searchable message from a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    /// 1-based line number in the transcript file.
    pub line_number: usize,
    pub role: String,
    pub text: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<RawMessage>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: Option<String>,
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<RawBlock>),
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

/// Extract the `sessionId` from an event path by matching the tail
/// `<sessionId>.jsonl`. Stems containing path separators or `..` are
/// rejected so event payloads cannot point outside the sessions dir.
pub fn session_id_from_path(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IndexerError::InvalidPath(path.display().to_string()))?;
    let stem = name
        .strip_suffix(".jsonl")
        .ok_or_else(|| IndexerError::InvalidPath(format!("not a transcript file: {name}")))?;
    if stem.is_empty() || stem == ".." || stem.contains(['/', '\\']) {
        return Err(IndexerError::InvalidPath(format!(
            "bad session id in {name}"
        )));
    }
    Ok(stem.to_string())
}

/// Read messages from `path`, skipping the first `skip_lines` lines.
///
/// Returns the parsed messages together with the total line count observed,
/// which becomes the session's new watermark. The file is read to its
/// apparent EOF; appenders may race with us, later events pick up the rest.
pub fn read_messages_from(path: &Path, skip_lines: usize) -> Result<(Vec<TranscriptMessage>, usize)> {
    let raw = std::fs::read_to_string(path)?;
    let mut messages = Vec::new();
    let mut total_lines = 0usize;

    for (idx, line) in raw.lines().enumerate() {
        total_lines = idx + 1;
        if idx < skip_lines {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<RawRecord>(line) else {
            continue;
        };
        if record.kind.as_deref() != Some("message") {
            continue;
        }
        let Some(message) = record.message else {
            continue;
        };
        let role = message.role.unwrap_or_default();
        if role != "user" && role != "assistant" {
            continue;
        }
        let text = flatten_content(message.content);
        if text.is_empty() {
            continue;
        }
        messages.push(TranscriptMessage {
            line_number: idx + 1,
            role,
            text,
            timestamp: record.timestamp,
        });
    }

    Ok((messages, total_lines))
}

/// Read every message in the transcript.
pub fn read_messages(path: &Path) -> Result<Vec<TranscriptMessage>> {
    read_messages_from(path, 0).map(|(messages, _)| messages)
}

fn flatten_content(content: Option<RawContent>) -> String {
    match content {
        None => String::new(),
        Some(RawContent::Text(text)) => text,
        Some(RawContent::Blocks(blocks)) => {
            let mut parts = Vec::new();
            for block in blocks {
                if block.kind.as_deref() == Some("text") {
                    if let Some(text) = block.text {
                        if !text.is_empty() {
                            parts.push(text);
                        }
                    }
                }
            }
            parts.join("\n")
        }
    }
}

/// Pull an ISO `YYYY-MM-DD` date out of a timestamp string, if it has one.
#[must_use]
pub fn iso_date_prefix(timestamp: &str) -> Option<String> {
    let prefix = timestamp.get(0..10)?;
    let bytes = prefix.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit());
    shaped.then(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_transcript(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".jsonl")
            .tempfile()
            .expect("tempfile");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        file
    }

    #[test]
    fn parses_string_and_block_content() {
        let file = write_transcript(&[
            r#"{"type":"message","timestamp":"2026-07-01T10:00:00Z","message":{"role":"user","content":"plain text body"}}"#,
            r#"{"type":"message","timestamp":"2026-07-01T10:01:00Z","message":{"role":"assistant","content":[{"type":"text","text":"block one"},{"type":"text","text":"block two"}]}}"#,
        ]);
        let messages = read_messages(file.path()).expect("read");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "plain text body");
        assert_eq!(messages[0].line_number, 1);
        assert_eq!(messages[1].text, "block one\nblock two");
    }

    #[test]
    fn skips_non_message_and_malformed_lines() {
        let file = write_transcript(&[
            r#"{"type":"summary","text":"ignored"}"#,
            "not json at all",
            r#"{"type":"message","message":{"role":"tool","content":"tool output"}}"#,
            r#"{"type":"message","message":{"role":"user","content":"kept"}}"#,
        ]);
        let (messages, total) = read_messages_from(file.path(), 0).expect("read");
        assert_eq!(total, 4);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "kept");
        assert_eq!(messages[0].line_number, 4);
    }

    #[test]
    fn resumes_after_watermark() {
        let file = write_transcript(&[
            r#"{"type":"message","message":{"role":"user","content":"first"}}"#,
            r#"{"type":"message","message":{"role":"user","content":"second"}}"#,
            r#"{"type":"message","message":{"role":"user","content":"third"}}"#,
        ]);
        let (messages, total) = read_messages_from(file.path(), 2).expect("read");
        assert_eq!(total, 3);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "third");
    }

    #[test]
    fn session_id_comes_from_file_tail() {
        assert_eq!(
            session_id_from_path(Path::new("/data/sessions/abc-123.jsonl")).expect("id"),
            "abc-123"
        );
        assert!(session_id_from_path(Path::new("notes.md")).is_err());
        assert!(session_id_from_path(Path::new("...jsonl")).is_err());
    }

    #[test]
    fn iso_date_prefix_requires_shape() {
        assert_eq!(
            iso_date_prefix("2026-07-01T10:00:00Z").as_deref(),
            Some("2026-07-01")
        );
        assert_eq!(iso_date_prefix("July 1, 2026"), None);
        assert_eq!(iso_date_prefix("2026"), None);
    }
}
