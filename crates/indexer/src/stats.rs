use serde::{Deserialize, Serialize};

/// Outcome of one incremental `update_index` run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStats {
    pub messages_added: usize,
    pub tokens_added: usize,
    pub last_indexed_line: usize,
    pub time_ms: u64,
}

/// Outcome of a full index build.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub sessions: usize,
    pub messages: usize,
    pub unique_tokens: usize,
    pub time_ms: u64,
}
