//! Incremental index maintenance.
//!
//! One `update_index` run is the unit of work: take the exclusive index
//! lock, fold the transcript's new messages into the in-memory index, and
//! swap the file atomically. Two updates for the same session serialise on
//! the lock; readers never observe a half-written index.

use crate::staleness::scan_transcripts;
use crate::tokenize::tokenize;
use crate::transcript::{iso_date_prefix, read_messages_from, TranscriptMessage};
use crate::{BuildStats, IndexerError, InvertedIndex, Result, SessionEntry, UpdateStats};
use fs2::FileExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Advisory lock acquisition budget. A timeout aborts only the current
/// update; the event is reconstructed on the next transcript update.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Tokens kept as per-session topics.
const TOPICS_PER_SESSION: usize = 8;

static INDEX_WRITE_LOCK_WAIT_MS_LAST: AtomicU64 = AtomicU64::new(0);
static INDEX_WRITE_LOCK_WAIT_MS_MAX: AtomicU64 = AtomicU64::new(0);

pub fn index_write_lock_wait_ms_last() -> u64 {
    INDEX_WRITE_LOCK_WAIT_MS_LAST.load(Ordering::Relaxed)
}

pub fn index_write_lock_wait_ms_max() -> u64 {
    INDEX_WRITE_LOCK_WAIT_MS_MAX.load(Ordering::Relaxed)
}

fn update_write_lock_wait_ms(wait_ms: u64) {
    INDEX_WRITE_LOCK_WAIT_MS_LAST.store(wait_ms, Ordering::Relaxed);
    INDEX_WRITE_LOCK_WAIT_MS_MAX.fetch_max(wait_ms, Ordering::Relaxed);
}

struct IndexWriteLock {
    file: std::fs::File,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

fn acquire_index_write_lock(lock_path: &Path) -> Result<IndexWriteLock> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|err| {
            IndexerError::Other(format!("open index lock {}: {err}", lock_path.display()))
        })?;

    let start = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => break,
            Err(_) if start.elapsed() < LOCK_TIMEOUT => {
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(_) => return Err(IndexerError::LockTimeout(LOCK_TIMEOUT)),
        }
    }
    update_write_lock_wait_ms(start.elapsed().as_millis() as u64);
    Ok(IndexWriteLock { file })
}

/// Owns the index file and the sessions directory it shadows.
#[derive(Debug, Clone)]
pub struct IndexMaintainer {
    index_path: PathBuf,
    sessions_dir: PathBuf,
}

impl IndexMaintainer {
    pub fn new(index_path: impl Into<PathBuf>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            sessions_dir: sessions_dir.into(),
        }
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn lock_path(&self) -> PathBuf {
        self.index_path.with_extension("lock")
    }

    /// Fold the transcript's messages past the session watermark into the
    /// index. No message is indexed twice; `last_indexed_line` only grows.
    pub async fn update_index(
        &self,
        session_id: &str,
        session_file: &Path,
    ) -> Result<UpdateStats> {
        let this = self.clone();
        let session_id = session_id.to_string();
        let session_file = session_file.to_path_buf();
        tokio::task::spawn_blocking(move || this.update_index_blocking(&session_id, &session_file))
            .await
            .map_err(|err| IndexerError::Other(format!("join update task: {err}")))?
    }

    fn update_index_blocking(&self, session_id: &str, session_file: &Path) -> Result<UpdateStats> {
        let start = Instant::now();
        let _lock = acquire_index_write_lock(&self.lock_path())?;

        let mut index = self.load_locked();
        let skip = index
            .sessions
            .get(session_id)
            .map_or(0, |entry| entry.last_indexed_line);

        let (messages, total_lines) = read_messages_from(session_file, skip)?;
        let watermark = skip.max(total_lines);

        if messages.is_empty() && index.sessions.get(session_id).is_some_and(|e| e.last_indexed_line == watermark) {
            return Ok(UpdateStats {
                messages_added: 0,
                tokens_added: 0,
                last_indexed_line: watermark,
                time_ms: start.elapsed().as_millis() as u64,
            });
        }

        let stats = apply_messages(&mut index, session_id, session_file, &messages, watermark);
        index.stamp();
        index.save(&self.index_path)?;

        Ok(UpdateStats {
            time_ms: start.elapsed().as_millis() as u64,
            ..stats
        })
    }

    /// Full build over every transcript in the sessions directory.
    /// Replaces the index wholesale; the previous file survives until the
    /// final atomic rename.
    pub async fn build_index(&self) -> Result<BuildStats> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.build_index_blocking())
            .await
            .map_err(|err| IndexerError::Other(format!("join build task: {err}")))?
    }

    fn build_index_blocking(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let _lock = acquire_index_write_lock(&self.lock_path())?;

        let mut index = InvertedIndex::empty();
        let mut messages_total = 0usize;

        for (session_id, path, _) in scan_transcripts(&self.sessions_dir) {
            let (messages, total_lines) = match read_messages_from(&path, 0) {
                Ok(out) => out,
                Err(err) => {
                    log::warn!("skipping unreadable transcript {}: {err}", path.display());
                    continue;
                }
            };
            messages_total += messages.len();
            apply_messages(&mut index, &session_id, &path, &messages, total_lines);
        }

        index.stamp();
        index.save(&self.index_path)?;

        Ok(BuildStats {
            sessions: index.sessions.len(),
            messages: messages_total,
            unique_tokens: index.tokens.len(),
            time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Init-on-first-use: load the index, or build it synchronously when
    /// absent. A corrupt file is logged and rebuilt.
    pub async fn load_or_build(&self) -> Result<InvertedIndex> {
        match InvertedIndex::load(&self.index_path) {
            Ok(Some(index)) => return Ok(index),
            Ok(None) => log::info!("index absent, building from {}", self.sessions_dir.display()),
            Err(err) => log::warn!("index corrupt ({err}), rebuilding"),
        }
        self.build_index().await?;
        InvertedIndex::load(&self.index_path)?
            .ok_or_else(|| IndexerError::Other("index missing after build".into()))
    }

    fn load_locked(&self) -> InvertedIndex {
        match InvertedIndex::load(&self.index_path) {
            Ok(Some(index)) => index,
            Ok(None) => InvertedIndex::empty(),
            Err(err) => {
                // Start over; staleness assessment will flag the sessions
                // the fresh index is missing and the refresher rebuilds them.
                log::warn!("index corrupt ({err}), starting from empty");
                InvertedIndex::empty()
            }
        }
    }
}

fn apply_messages(
    index: &mut InvertedIndex,
    session_id: &str,
    session_file: &Path,
    messages: &[TranscriptMessage],
    watermark: usize,
) -> UpdateStats {
    let mut token_counts: HashMap<String, usize> = HashMap::new();
    let mut tokens_added = 0usize;

    for message in messages {
        let mut seen_in_message = std::collections::HashSet::new();
        for token in tokenize(&message.text) {
            *token_counts.entry(token.clone()).or_insert(0) += 1;
            if seen_in_message.insert(token.clone()) {
                index.insert_posting(&token, session_id);
                tokens_added += 1;
            }
        }
    }

    let entry = index
        .sessions
        .entry(session_id.to_string())
        .or_insert_with(|| SessionEntry {
            path: session_file.display().to_string(),
            ..SessionEntry::default()
        });

    entry.last_indexed_line = entry.last_indexed_line.max(watermark);
    entry.message_count += messages.len();
    entry.topics = merge_topics(&entry.topics, &token_counts);

    if entry.date.is_none() {
        if let Some(timestamp) = messages.iter().find_map(|m| m.timestamp.as_deref()) {
            match iso_date_prefix(timestamp) {
                Some(date) => entry.date = Some(date),
                None => entry.date_invalid = true,
            }
        }
    }

    UpdateStats {
        messages_added: messages.len(),
        tokens_added,
        last_indexed_line: entry.last_indexed_line,
        time_ms: 0,
    }
}

/// Re-rank topics from the new batch's frequencies. Existing topics keep a
/// presence weight so a quiet update does not wipe them out.
fn merge_topics(existing: &[String], counts: &HashMap<String, usize>) -> Vec<String> {
    let mut combined: HashMap<&str, usize> = HashMap::new();
    for topic in existing {
        combined.insert(topic.as_str(), 1);
    }
    for (token, count) in counts {
        *combined.entry(token.as_str()).or_insert(0) += count;
    }

    let mut ranked: Vec<(&str, usize)> = combined.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOPICS_PER_SESSION)
        .map(|(token, _)| token.to_string())
        .collect()
}
