//! Filesystem change detection for `.planning/`.
//!
//! `notify` delivers raw events on its own thread; relevant paths are pushed
//! into an unbounded channel and a [`debounce`] task turns bursts of them into
//! single [`RefreshSignal`]s.

use crate::error::{LiveError, Result};
use gsd_core::paths;
use notify::event::RemoveKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const SIGNAL_BUFFER: usize = 16;
/// A burst is flushed after at most this many quiet windows, even if events
/// keep arriving.
const MAX_WAIT_FACTOR: u32 = 10;

/// One debounced batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    /// Distinct paths touched during the burst, sorted.
    pub paths: Vec<PathBuf>,
}

pub struct ChangeWatcher {
    watcher: Option<RecommendedWatcher>,
    debounce_task: Option<JoinHandle<()>>,
    dir: PathBuf,
    dir_removed: Arc<AtomicBool>,
}

impl ChangeWatcher {
    /// Watch `planning_dir` recursively. The receiver yields one signal per
    /// burst of relevant events and closes after [`ChangeWatcher::stop`].
    pub fn start(planning_dir: &Path, quiet: Duration) -> Result<(Self, mpsc::Receiver<RefreshSignal>)> {
        if !planning_dir.is_dir() {
            return Err(LiveError::WatchDirMissing(planning_dir.to_path_buf()));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let dir_removed = Arc::new(AtomicBool::new(false));
        let removed_flag = Arc::clone(&dir_removed);
        let watched = planning_dir.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if removes_watched_dir(&event, &watched) {
                        removed_flag.store(true, Ordering::SeqCst);
                    }
                    if !should_process_event(&event) {
                        return;
                    }
                    for path in event.paths {
                        let _ = raw_tx.send(path);
                    }
                }
                Err(e) => warn!(error = %e, "file watcher error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(planning_dir, RecursiveMode::Recursive)?;

        let (signal_rx, debounce_task) = debounce(raw_rx, quiet);
        debug!(dir = %planning_dir.display(), quiet_ms = quiet.as_millis() as u64, "watching planning directory");

        Ok((
            Self {
                watcher: Some(watcher),
                debounce_task: Some(debounce_task),
                dir: planning_dir.to_path_buf(),
                dir_removed,
            },
            signal_rx,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// False once stopped, or once the watched directory itself was removed.
    /// A watch on a removed directory never sees the directory recreated at the
    /// same path, so the caller has to start a new watcher.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some() && !self.dir_removed.load(Ordering::SeqCst)
    }

    /// Stop watching. The signal stream ends; calling twice is harmless.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.dir);
            debug!(dir = %self.dir.display(), "stopped watching planning directory");
        }
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Event filtering
// ---------------------------------------------------------------------------

/// Create/modify/remove events that touch a Markdown file, or remove a
/// directory.
pub fn should_process_event(event: &Event) -> bool {
    match event.kind {
        EventKind::Remove(RemoveKind::Folder) => true,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            event.paths.iter().any(|p| paths::is_markdown(p))
        }
        _ => false,
    }
}

/// A removal of `dir` itself, or any removal after which `dir` is gone.
fn removes_watched_dir(event: &Event, dir: &Path) -> bool {
    matches!(event.kind, EventKind::Remove(_)) && (event.paths.iter().any(|p| p == dir) || !dir.is_dir())
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Coalesce raw paths into signals: a signal goes out once `quiet` has passed
/// without a new path arriving, or once the burst has lasted
/// `MAX_WAIT_FACTOR * quiet`. When `raw` closes, anything pending is flushed
/// and the signal channel closes.
pub fn debounce(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    quiet: Duration,
) -> (mpsc::Receiver<RefreshSignal>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
    let task = tokio::spawn(async move {
        while let Some(first) = raw.recv().await {
            let mut pending = BTreeSet::from([first]);
            let mut closed = false;
            let deadline = Instant::now() + quiet * MAX_WAIT_FACTOR;
            loop {
                let wait = quiet.min(deadline.saturating_duration_since(Instant::now()));
                if wait.is_zero() {
                    break;
                }
                match tokio::time::timeout(wait, raw.recv()).await {
                    Ok(Some(path)) => {
                        pending.insert(path);
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
            let signal = RefreshSignal {
                paths: pending.into_iter().collect(),
            };
            debug!(paths = signal.paths.len(), "change burst settled");
            if tx.send(signal).await.is_err() || closed {
                return;
            }
        }
    });
    (rx, task)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn filters_markdown_changes() {
        let modify = || EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert!(should_process_event(&event(modify(), "/p/.planning/STATE.md")));
        assert!(should_process_event(&event(
            EventKind::Create(CreateKind::File),
            "/p/.planning/todos/pending/new.md"
        )));
        assert!(should_process_event(&event(
            EventKind::Remove(RemoveKind::File),
            "/p/.planning/ROADMAP.md"
        )));
        assert!(!should_process_event(&event(modify(), "/p/.planning/STATE.md.swp")));
        assert!(!should_process_event(&event(
            EventKind::Create(CreateKind::Folder),
            "/p/.planning/phases/04-new"
        )));
        assert!(should_process_event(&event(
            EventKind::Remove(RemoveKind::Folder),
            "/p/.planning/phases/04-new"
        )));
        assert!(!should_process_event(&event(
            EventKind::Access(notify::event::AccessKind::Any),
            "/p/.planning/STATE.md"
        )));
    }

    #[tokio::test]
    async fn burst_becomes_one_signal() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (mut signals, _task) = debounce(raw_rx, Duration::from_millis(50));

        raw_tx.send(PathBuf::from("a.md")).unwrap();
        raw_tx.send(PathBuf::from("b.md")).unwrap();
        raw_tx.send(PathBuf::from("a.md")).unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(2), signals.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.paths, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);

        // nothing else queued
        assert!(tokio::time::timeout(Duration::from_millis(150), signals.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn separated_bursts_give_separate_signals() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (mut signals, _task) = debounce(raw_rx, Duration::from_millis(30));

        raw_tx.send(PathBuf::from("a.md")).unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), signals.recv()).await.unwrap();
        assert!(first.is_some());

        raw_tx.send(PathBuf::from("b.md")).unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), signals.recv()).await.unwrap();
        assert_eq!(second.unwrap().paths, vec![PathBuf::from("b.md")]);
    }

    #[tokio::test]
    async fn closing_raw_flushes_and_ends() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (mut signals, task) = debounce(raw_rx, Duration::from_secs(10));
        raw_tx.send(PathBuf::from("a.md")).unwrap();
        drop(raw_tx);

        let signal = tokio::time::timeout(Duration::from_secs(2), signals.recv()).await.unwrap();
        assert!(signal.is_some());
        assert!(signals.recv().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn steady_stream_still_flushes() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let quiet = Duration::from_millis(40);
        let (mut signals, _task) = debounce(raw_rx, quiet);

        // writes every 10ms never leave a quiet gap
        let writer = tokio::spawn(async move {
            for i in 0..200 {
                if raw_tx.send(PathBuf::from(format!("{i}.md"))).is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let signal = tokio::time::timeout(Duration::from_millis(1500), signals.recv())
            .await
            .expect("burst was never flushed")
            .unwrap();
        assert!(!signal.paths.is_empty());
        writer.abort();
    }

    #[test]
    fn detects_removal_of_watched_dir() {
        let dir = TempDir::new().unwrap();
        let planning = dir.path().join(".planning");
        std::fs::create_dir(&planning).unwrap();

        let gone = event(EventKind::Remove(RemoveKind::Folder), planning.to_str().unwrap());
        assert!(removes_watched_dir(&gone, &planning));

        let file_removed = event(
            EventKind::Remove(RemoveKind::File),
            planning.join("STATE.md").to_str().unwrap(),
        );
        assert!(!removes_watched_dir(&file_removed, &planning));

        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            planning.to_str().unwrap(),
        );
        assert!(!removes_watched_dir(&modified, &planning));
    }

    #[tokio::test]
    async fn stops_running_when_dir_is_removed() {
        let dir = TempDir::new().unwrap();
        let planning = dir.path().join(".planning");
        std::fs::create_dir(&planning).unwrap();

        let (watcher, _signals) = ChangeWatcher::start(&planning, Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.dir(), planning.as_path());
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::remove_dir_all(&planning).unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(5), async {
            while watcher.is_running() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(stopped.is_ok(), "watcher still reports running");
    }

    #[tokio::test]
    async fn start_requires_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join(".planning");
        let err = ChangeWatcher::start(&missing, Duration::from_millis(50)).err().unwrap();
        assert!(matches!(err, LiveError::WatchDirMissing(_)));
    }

    #[tokio::test]
    async fn detects_file_write_and_stops() {
        let dir = TempDir::new().unwrap();
        let planning = dir.path().join(".planning");
        std::fs::create_dir(&planning).unwrap();

        let (mut watcher, mut signals) = ChangeWatcher::start(&planning, Duration::from_millis(50)).unwrap();
        assert!(watcher.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(planning.join("STATE.md"), "Progress: 10%\n").unwrap();
        let signal = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .expect("no signal after write")
            .unwrap();
        assert!(signal.paths.iter().any(|p| p.ends_with("STATE.md")));

        watcher.stop();
        assert!(!watcher.is_running());
        let end = tokio::time::timeout(Duration::from_secs(2), async {
            while signals.recv().await.is_some() {}
        })
        .await;
        assert!(end.is_ok());
    }
}
