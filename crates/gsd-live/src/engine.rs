//! The refresh engine: owns the published snapshot and serializes rebuilds.
//!
//! One task runs the loop below. Triggers (manual requests, watcher signals,
//! the periodic timer) only set a `pending` flag; a build starts when the flag
//! is set and no build is running, so any number of triggers that arrive
//! during a build collapse into a single follow-up build. Builds run on the
//! blocking pool and publish through a `watch` channel that only this task
//! writes, which keeps observed sequence numbers non-decreasing.
//!
//! A failed build halts automatic refreshing: timer, watcher and auto-refresh
//! triggers are dropped until a manual refresh succeeds. The failure also
//! drops the file watcher, which is started again after that success.

use crate::watcher::{ChangeWatcher, RefreshSignal};
use gsd_core::{paths, DashboardConfig, ProjectSnapshot, SnapshotBuilder};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// SnapshotSource
// ---------------------------------------------------------------------------

/// Something that can produce snapshots. Called from the blocking pool.
pub trait SnapshotSource: Send + 'static {
    fn build(&mut self) -> gsd_core::Result<ProjectSnapshot>;
}

impl SnapshotSource for SnapshotBuilder {
    fn build(&mut self) -> gsd_core::Result<ProjectSnapshot> {
        SnapshotBuilder::build(self)
    }
}

// ---------------------------------------------------------------------------
// Status / options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum EngineStatus {
    Idle,
    Building,
    Error(String),
}

impl EngineStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, EngineStatus::Error(_))
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Idle => f.write_str("idle"),
            EngineStatus::Building => f.write_str("building"),
            EngineStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub auto_refresh: bool,
    /// Periodic rebuild interval; `None` disables the timer.
    pub refresh_interval: Option<Duration>,
    pub debounce: Duration,
    /// `.planning/` directory to watch; `None` disables file watching.
    pub watch_dir: Option<PathBuf>,
}

impl EngineOptions {
    pub fn from_config(root: &Path, config: &DashboardConfig) -> Self {
        Self {
            auto_refresh: config.auto_refresh,
            refresh_interval: config.refresh_interval(),
            debounce: config.debounce(),
            watch_dir: Some(paths::planning_dir(root)),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = DashboardConfig::default();
        Self {
            auto_refresh: config.auto_refresh,
            refresh_interval: config.refresh_interval(),
            debounce: config.debounce(),
            watch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Manual,
    Watcher,
    Timer,
    AutoRefreshEnabled,
}

#[derive(Debug)]
enum Command {
    Refresh,
    SetAutoRefresh(bool),
    Shutdown,
}

type SharedSnapshot = Option<Arc<ProjectSnapshot>>;

// ---------------------------------------------------------------------------
// RefreshHandle
// ---------------------------------------------------------------------------

/// Renderer-facing side of a running engine.
pub struct RefreshHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SharedSnapshot>,
    status: watch::Receiver<EngineStatus>,
    auto_refresh: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// The most recently published snapshot, if any build has succeeded.
    pub fn current_snapshot(&self) -> Option<Arc<ProjectSnapshot>> {
        self.snapshot.borrow().clone()
    }

    /// Sequence numbers of published snapshots, starting with the current
    /// one. Intermediate values may be skipped by slow consumers.
    pub fn subscribe(&self) -> impl Stream<Item = u64> + Send + Unpin + 'static {
        WatchStream::new(self.snapshot.clone()).filter_map(|s| s.map(|s| s.sequence))
    }

    pub fn request_manual_refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.send(Command::SetAutoRefresh(enabled));
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn auto_refresh(&self) -> bool {
        *self.auto_refresh.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Stop the engine and wait for its task to finish. An in-flight build is
    /// left to complete on the blocking pool and its result discarded.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "refresh engine task failed");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("refresh engine already stopped");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

// ---------------------------------------------------------------------------
// RefreshEngine
// ---------------------------------------------------------------------------

pub struct RefreshEngine<S> {
    source: S,
    options: EngineOptions,
    signals: Option<mpsc::Receiver<RefreshSignal>>,
}

impl<S: SnapshotSource> RefreshEngine<S> {
    pub fn new(source: S, options: EngineOptions) -> Self {
        Self {
            source,
            options,
            signals: None,
        }
    }

    /// Use `signals` in place of a filesystem watcher.
    pub fn with_signals(mut self, signals: mpsc::Receiver<RefreshSignal>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Spawn the engine on the current runtime. The first build starts
    /// immediately regardless of the auto-refresh setting.
    pub fn start(self) -> RefreshHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(EngineStatus::Idle);
        let (auto_tx, auto_rx) = watch::channel(self.options.auto_refresh);

        let task = tokio::spawn(run(
            Arc::new(Mutex::new(self.source)),
            self.options,
            self.signals,
            cmd_rx,
            Publish {
                snapshot: snapshot_tx,
                status: status_tx,
                auto_refresh: auto_tx,
            },
        ));

        RefreshHandle {
            commands: cmd_tx,
            snapshot: snapshot_rx,
            status: status_rx,
            auto_refresh: auto_rx,
            task: Some(task),
        }
    }
}

struct Publish {
    snapshot: watch::Sender<SharedSnapshot>,
    status: watch::Sender<EngineStatus>,
    auto_refresh: watch::Sender<bool>,
}

type BuildOutput = gsd_core::Result<ProjectSnapshot>;

async fn run<S: SnapshotSource>(
    source: Arc<Mutex<S>>,
    options: EngineOptions,
    injected: Option<mpsc::Receiver<RefreshSignal>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    publish: Publish,
) {
    let mut auto_refresh = options.auto_refresh;
    let mut timer = options.refresh_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let manage_watcher = injected.is_none() && options.watch_dir.is_some();
    let mut watcher: Option<ChangeWatcher> = None;
    let mut signals = injected;
    if manage_watcher {
        (watcher, signals) = start_watcher(&options);
    }

    let mut pending: Option<Trigger> = Some(Trigger::Startup);
    let mut build: Option<JoinHandle<BuildOutput>> = None;
    // set by a failed build, cleared by the next successful one
    let mut halted = false;
    info!(auto_refresh, "refresh engine started");

    loop {
        if build.is_none() {
            if let Some(trigger) = pending.take() {
                debug!(?trigger, "starting build");
                publish.status.send_replace(EngineStatus::Building);
                let source = Arc::clone(&source);
                build = Some(tokio::task::spawn_blocking(move || {
                    // a panicked build poisons the lock; the builder itself is still usable
                    let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
                    source.build()
                }));
            }
        }

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Refresh) => {
                    pending = Some(Trigger::Manual);
                }
                Some(Command::SetAutoRefresh(enabled)) => {
                    if enabled && !auto_refresh && !halted {
                        pending.get_or_insert(Trigger::AutoRefreshEnabled);
                    }
                    auto_refresh = enabled;
                    publish.auto_refresh.send_replace(enabled);
                    info!(auto_refresh, "auto-refresh toggled");
                }
                Some(Command::Shutdown) | None => break,
            },
            signal = next_signal(&mut signals), if signals.is_some() => match signal {
                Some(signal) => {
                    if watcher.as_ref().is_some_and(|w| !w.is_running()) {
                        drop_watcher(&mut watcher, &mut signals);
                    }
                    if auto_refresh && !halted {
                        debug!(paths = signal.paths.len(), "change detected");
                        pending.get_or_insert(Trigger::Watcher);
                    }
                }
                None => {
                    debug!("change signal stream ended");
                    signals = None;
                    watcher = None;
                }
            },
            _ = next_tick(&mut timer), if timer.is_some() => {
                if auto_refresh && !halted {
                    pending.get_or_insert(Trigger::Timer);
                }
            }
            result = finish(&mut build), if build.is_some() => {
                build = None;
                let succeeded = apply(result, &publish);
                halted = !succeeded;
                if halted {
                    if pending != Some(Trigger::Manual) {
                        pending = None;
                    }
                    if manage_watcher {
                        drop_watcher(&mut watcher, &mut signals);
                    }
                } else if manage_watcher && !watcher.as_ref().is_some_and(ChangeWatcher::is_running) {
                    drop_watcher(&mut watcher, &mut signals);
                    (watcher, signals) = start_watcher(&options);
                }
            }
        }
    }

    if let Some(mut w) = watcher.take() {
        w.stop();
    }
    info!("refresh engine stopped");
}

/// Publish a finished build. Returns true when a snapshot was published.
fn apply(result: Result<BuildOutput, JoinError>, publish: &Publish) -> bool {
    match result {
        Ok(Ok(snapshot)) => {
            let sequence = snapshot.sequence;
            if !snapshot.warnings.is_empty() {
                debug!(sequence, warnings = snapshot.warnings.len(), "snapshot has warnings");
            }
            publish.snapshot.send_replace(Some(Arc::new(snapshot)));
            publish.status.send_replace(EngineStatus::Idle);
            debug!(sequence, "snapshot published");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "snapshot build failed");
            publish.status.send_replace(EngineStatus::Error(e.to_string()));
            false
        }
        Err(e) => {
            warn!(error = %e, "snapshot build panicked");
            publish
                .status
                .send_replace(EngineStatus::Error(format!("build task failed: {e}")));
            false
        }
    }
}

fn drop_watcher(watcher: &mut Option<ChangeWatcher>, signals: &mut Option<mpsc::Receiver<RefreshSignal>>) {
    if let Some(mut w) = watcher.take() {
        debug!(dir = %w.dir().display(), "dropping file watcher until the next successful build");
        w.stop();
    }
    *signals = None;
}

fn start_watcher(options: &EngineOptions) -> (Option<ChangeWatcher>, Option<mpsc::Receiver<RefreshSignal>>) {
    let Some(dir) = options.watch_dir.as_deref() else {
        return (None, None);
    };
    match ChangeWatcher::start(dir, options.debounce) {
        Ok((watcher, signals)) => (Some(watcher), Some(signals)),
        Err(e) => {
            debug!(error = %e, "file watcher not started, will retry after next build");
            (None, None)
        }
    }
}

async fn next_signal(signals: &mut Option<mpsc::Receiver<RefreshSignal>>) -> Option<RefreshSignal> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn finish(build: &mut Option<JoinHandle<BuildOutput>>) -> Result<BuildOutput, JoinError> {
    match build {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
