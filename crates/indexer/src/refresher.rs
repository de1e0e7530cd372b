//! Debounced transcript-update scheduling.
//!
//! The host fires `session:transcript:update` whenever a transcript is
//! appended; when running as a long-lived server we also watch the sessions
//! directory directly. Either way the events land here and are coalesced:
//! per-session debounce, a cooldown after each successful update, and a
//! bounded pending map that sheds the oldest entry on overflow.

use crate::transcript::session_id_from_path;
use crate::{IndexMaintainer, IndexerError, Result, UpdateStats};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Duration, Instant};

mod defaults {
    use super::Duration;
    pub const DEBOUNCE: Duration = Duration::from_secs(5);
    pub const COOLDOWN: Duration = Duration::from_secs(30);
    pub const MAX_PENDING: usize = 100;
}

#[derive(Debug, Clone, Copy)]
pub struct RefresherConfig {
    pub debounce: Duration,
    pub cooldown: Duration,
    pub max_pending: usize,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            debounce: defaults::DEBOUNCE,
            cooldown: defaults::COOLDOWN,
            max_pending: defaults::MAX_PENDING,
        }
    }
}

/// Inbound event payload: the transcript that changed.
#[derive(Debug, Clone)]
pub struct TranscriptUpdate {
    pub session_file: PathBuf,
}

/// Broadcast after each attempted update.
#[derive(Debug, Clone)]
pub struct IndexUpdateEvent {
    pub session_id: String,
    pub success: bool,
    pub stats: Option<UpdateStats>,
    pub error: Option<String>,
    pub completed_at: SystemTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefresherHealth {
    pub pending: usize,
    pub updating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub updates_completed: u64,
}

impl RefresherHealth {
    fn initial() -> Self {
        Self {
            pending: 0,
            updating: false,
            last_error: None,
            consecutive_failures: 0,
            updates_completed: 0,
        }
    }
}

enum Command {
    Transcript(TranscriptUpdate),
    Rebuild,
    Shutdown,
}

#[derive(Clone)]
pub struct IndexRefresher {
    inner: Arc<Inner>,
}

struct Inner {
    command_tx: mpsc::Sender<Command>,
    update_tx: broadcast::Sender<IndexUpdateEvent>,
    health_tx: watch::Sender<RefresherHealth>,
    // Keeps the watch channel alive so health sends never observe a
    // receiver-less channel.
    _health_guard: watch::Receiver<RefresherHealth>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl IndexRefresher {
    /// Start the scheduler and a filesystem watcher over the maintainer's
    /// sessions directory.
    pub fn start(maintainer: IndexMaintainer, config: RefresherConfig) -> Result<Self> {
        let refresher = Self::start_without_watcher(maintainer.clone(), config);
        let command_tx = refresher.inner.command_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                for path in event.paths {
                    if path.extension().is_some_and(|ext| ext == "jsonl") {
                        let _ = command_tx
                            .blocking_send(Command::Transcript(TranscriptUpdate {
                                session_file: path.clone(),
                            }));
                    }
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|err| IndexerError::Other(format!("watcher init failed: {err}")))?;
        watcher
            .watch(maintainer.sessions_dir(), RecursiveMode::NonRecursive)
            .map_err(|err| IndexerError::Other(format!("watch sessions dir: {err}")))?;

        *refresher
            .inner
            ._watcher
            .lock()
            .expect("watcher mutex poisoned") = Some(watcher);
        Ok(refresher)
    }

    /// Start the scheduler only; events arrive via [`Self::notify_update`].
    pub fn start_without_watcher(maintainer: IndexMaintainer, config: RefresherConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (update_tx, _) = broadcast::channel(64);
        let (health_tx, health_rx) = watch::channel(RefresherHealth::initial());

        tokio::spawn(run_loop(
            maintainer,
            config,
            command_rx,
            update_tx.clone(),
            health_tx.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                command_tx,
                update_tx,
                health_tx,
                _health_guard: health_rx,
                _watcher: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Deliver a `session:transcript:update` event.
    pub async fn notify_update(&self, update: TranscriptUpdate) -> Result<()> {
        self.inner
            .command_tx
            .send(Command::Transcript(update))
            .await
            .map_err(|err| IndexerError::Other(format!("refresher send failed: {err}")))
    }

    /// Schedule a full rebuild (explicit trigger of the stale → rebuilding
    /// transition).
    pub async fn trigger_rebuild(&self) -> Result<()> {
        self.inner
            .command_tx
            .send(Command::Rebuild)
            .await
            .map_err(|err| IndexerError::Other(format!("refresher send failed: {err}")))
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<IndexUpdateEvent> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> RefresherHealth {
        self.inner.health_tx.subscribe().borrow().clone()
    }
}

impl Drop for IndexRefresher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(Command::Shutdown);
        }
    }
}

struct Pending {
    session_file: PathBuf,
    due: Instant,
    queued_at: Instant,
}

async fn run_loop(
    maintainer: IndexMaintainer,
    config: RefresherConfig,
    mut command_rx: mpsc::Receiver<Command>,
    update_tx: broadcast::Sender<IndexUpdateEvent>,
    health_tx: watch::Sender<RefresherHealth>,
) {
    let mut pending: HashMap<String, Pending> = HashMap::new();
    let mut last_success: HashMap<String, Instant> = HashMap::new();
    let mut health = RefresherHealth::initial();

    loop {
        let next_due = pending.values().map(|p| p.due).min();

        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Transcript(update)) => {
                        enqueue(&mut pending, &last_success, &config, update);
                        health.pending = pending.len();
                        let _ = health_tx.send(health.clone());
                    }
                    Some(Command::Rebuild) => {
                        health.updating = true;
                        let _ = health_tx.send(health.clone());
                        if let Err(err) = maintainer.build_index().await {
                            log::error!("index rebuild failed: {err}");
                            health.last_error = Some(err.to_string());
                            health.consecutive_failures += 1;
                        } else {
                            health.last_error = None;
                            health.consecutive_failures = 0;
                        }
                        health.updating = false;
                        let _ = health_tx.send(health.clone());
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
            () = async {
                if let Some(due) = next_due {
                    time::sleep_until(due).await;
                }
            }, if next_due.is_some() => {
                let now = Instant::now();
                let Some(session_id) = pending
                    .iter()
                    .filter(|(_, p)| p.due <= now)
                    .min_by_key(|(_, p)| p.due)
                    .map(|(id, _)| id.clone())
                else {
                    continue;
                };
                let item = pending.remove(&session_id).expect("pending entry");

                health.updating = true;
                health.pending = pending.len();
                let _ = health_tx.send(health.clone());

                let outcome = maintainer
                    .update_index(&session_id, &item.session_file)
                    .await;
                let event = match outcome {
                    Ok(stats) => {
                        last_success.insert(session_id.clone(), Instant::now());
                        health.last_error = None;
                        health.consecutive_failures = 0;
                        health.updates_completed += 1;
                        IndexUpdateEvent {
                            session_id,
                            success: true,
                            stats: Some(stats),
                            error: None,
                            completed_at: SystemTime::now(),
                        }
                    }
                    Err(err) => {
                        // Lock timeouts drop the event; the next transcript
                        // update for this session reconstructs the work.
                        log::warn!("index update failed: {err}");
                        health.last_error = Some(err.to_string());
                        health.consecutive_failures += 1;
                        IndexUpdateEvent {
                            session_id,
                            success: false,
                            stats: None,
                            error: Some(err.to_string()),
                            completed_at: SystemTime::now(),
                        }
                    }
                };
                health.updating = false;
                let _ = health_tx.send(health.clone());
                let _ = update_tx.send(event);
            }
        }
    }
}

fn enqueue(
    pending: &mut HashMap<String, Pending>,
    last_success: &HashMap<String, Instant>,
    config: &RefresherConfig,
    update: TranscriptUpdate,
) {
    let session_id = match session_id_from_path(&update.session_file) {
        Ok(id) => id,
        Err(err) => {
            log::warn!("ignoring transcript update: {err}");
            return;
        }
    };

    let now = Instant::now();
    let mut due = now + config.debounce;
    // Events inside the cooldown window extend the debounce but never cause
    // an extra run.
    if let Some(last) = last_success.get(&session_id) {
        due = due.max(*last + config.cooldown);
    }

    match pending.get_mut(&session_id) {
        Some(existing) => {
            existing.session_file = update.session_file;
            existing.due = due;
        }
        None => {
            pending.insert(
                session_id,
                Pending {
                    session_file: update.session_file,
                    due,
                    queued_at: now,
                },
            );
        }
    }

    while pending.len() > config.max_pending {
        let Some(oldest) = pending
            .iter()
            .min_by_key(|(_, p)| p.queued_at)
            .map(|(id, _)| id.clone())
        else {
            break;
        };
        log::warn!("refresher queue overflow, dropping {oldest}");
        pending.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InvertedIndex;
    use std::io::Write;
    use std::path::Path;

    fn workspace() -> (tempfile::TempDir, IndexMaintainer) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let sessions = dir.path().join("sessions");
        std::fs::create_dir_all(&sessions).expect("mkdir");
        let maintainer = IndexMaintainer::new(dir.path().join("inverted-index.json"), sessions);
        (dir, maintainer)
    }

    fn write_session(dir: &Path, session_id: &str, text: &str) -> PathBuf {
        let path = dir.join(format!("{session_id}.jsonl"));
        let mut file = std::fs::File::create(&path).expect("create session");
        writeln!(
            file,
            r#"{{"type":"message","message":{{"role":"user","content":"{text}"}}}}"#
        )
        .expect("write");
        path
    }

    fn fast_config() -> RefresherConfig {
        RefresherConfig {
            debounce: Duration::from_millis(40),
            cooldown: Duration::from_millis(200),
            max_pending: 100,
        }
    }

    #[tokio::test]
    async fn rapid_events_coalesce_into_one_update() {
        let (_dir, maintainer) = workspace();
        let path = write_session(maintainer.sessions_dir(), "s1", "coalesced update body");

        let refresher = IndexRefresher::start_without_watcher(maintainer.clone(), fast_config());
        let mut updates = refresher.subscribe_updates();

        for _ in 0..3 {
            refresher
                .notify_update(TranscriptUpdate {
                    session_file: path.clone(),
                })
                .await
                .expect("send");
        }

        let event = time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("update within deadline")
            .expect("event");
        assert!(event.success);
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.stats.expect("stats").messages_added, 1);

        // No second run was scheduled for the coalesced events.
        assert!(
            time::timeout(Duration::from_millis(300), updates.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cooldown_defers_the_next_run() {
        let (_dir, maintainer) = workspace();
        let path = write_session(maintainer.sessions_dir(), "s1", "first body");

        let refresher = IndexRefresher::start_without_watcher(maintainer.clone(), fast_config());
        let mut updates = refresher.subscribe_updates();

        refresher
            .notify_update(TranscriptUpdate {
                session_file: path.clone(),
            })
            .await
            .expect("send");
        let first_at = Instant::now();
        time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("first update")
            .expect("event");

        // Append and immediately notify: the run must wait out the cooldown.
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open");
        writeln!(
            file,
            r#"{{"type":"message","message":{{"role":"user","content":"second body"}}}}"#
        )
        .expect("append");
        refresher
            .notify_update(TranscriptUpdate {
                session_file: path.clone(),
            })
            .await
            .expect("send");

        let event = time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("second update")
            .expect("event");
        assert!(event.success);
        assert!(first_at.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn rebuild_command_rebuilds_index() {
        let (_dir, maintainer) = workspace();
        write_session(maintainer.sessions_dir(), "s1", "rebuild me");

        let refresher = IndexRefresher::start_without_watcher(maintainer.clone(), fast_config());
        refresher.trigger_rebuild().await.expect("send");

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if maintainer.index_path().exists() {
                break;
            }
            assert!(Instant::now() < deadline, "rebuild never landed");
            time::sleep(Duration::from_millis(20)).await;
        }
        let index = InvertedIndex::load(maintainer.index_path())
            .expect("load")
            .expect("present");
        assert!(index.sessions.contains_key("s1"));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_pending_entry() {
        let (_dir, maintainer) = workspace();
        let config = RefresherConfig {
            debounce: Duration::from_millis(500),
            cooldown: Duration::from_millis(500),
            max_pending: 2,
        };
        let refresher = IndexRefresher::start_without_watcher(maintainer.clone(), config);

        for id in ["a", "b", "c"] {
            let path = write_session(maintainer.sessions_dir(), id, "overflow body");
            refresher
                .notify_update(TranscriptUpdate { session_file: path })
                .await
                .expect("send");
        }
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(refresher.health_snapshot().pending, 2);
    }

    #[tokio::test]
    async fn events_with_bad_paths_are_ignored() {
        let (_dir, maintainer) = workspace();
        let refresher = IndexRefresher::start_without_watcher(maintainer, fast_config());
        refresher
            .notify_update(TranscriptUpdate {
                session_file: PathBuf::from("not-a-transcript.txt"),
            })
            .await
            .expect("send");
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(refresher.health_snapshot().pending, 0);
    }
}
