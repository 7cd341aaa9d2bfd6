use crate::cmd::{ensure_project, load_config, status};
use anyhow::Context;
use gsd_core::SnapshotBuilder;
use gsd_live::{EngineOptions, EngineStatus, RefreshEngine, RefreshHandle};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// A line typed on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    Refresh,
    ToggleAutoRefresh,
    Quit,
}

impl WatchCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "refresh" => Some(WatchCommand::Refresh),
            "t" | "toggle" => Some(WatchCommand::ToggleAutoRefresh),
            "q" | "quit" | "exit" => Some(WatchCommand::Quit),
            _ => None,
        }
    }
}

pub fn run(root: &Path, interval: Option<u64>, no_auto_refresh: bool, json: bool) -> anyhow::Result<()> {
    ensure_project(root)?;
    let mut config = load_config(root)?;
    if let Some(secs) = interval {
        config.refresh_interval_secs = secs;
    }
    if no_auto_refresh {
        config.auto_refresh = false;
    }

    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let root_buf = root.to_path_buf();

    let result = rt.block_on(async move {
        let options = EngineOptions::from_config(&root_buf, &config);
        let builder = SnapshotBuilder::new(&root_buf, &config);
        let handle = RefreshEngine::new(builder, options).start();
        let result = watch_loop(&handle, json).await;
        handle.shutdown().await;
        result
    });
    // a pending stdin read sits on a blocking thread and would hold up a plain drop
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn watch_loop(handle: &RefreshHandle, json: bool) -> anyhow::Result<()> {
    let mut sequences = handle.subscribe();
    let mut status_rx = handle.watch_status();
    let mut stdin = Some(BufReader::new(tokio::io::stdin()).lines());
    // the handle reports the engine's value only after it has seen the command
    let mut auto_refresh = handle.auto_refresh();

    // Show the first snapshot (or the first failure) before reading commands.
    tokio::select! {
        seq = sequences.next() => {
            if seq.is_some() {
                print_current(handle, json)?;
            }
        }
        _ = wait_for_error(&mut status_rx) => print_status(handle),
    }

    if !json {
        println!("Commands: r = refresh, t = toggle auto-refresh, q = quit");
    }

    loop {
        tokio::select! {
            seq = sequences.next() => match seq {
                Some(_) => print_current(handle, json)?,
                None => break,
            },
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let failed = status_rx.borrow_and_update().is_error();
                if failed {
                    print_status(handle);
                }
            }
            line = next_line(&mut stdin), if stdin.is_some() => match line {
                Some(line) => match WatchCommand::parse(&line) {
                    Some(WatchCommand::Refresh) => handle.request_manual_refresh(),
                    Some(WatchCommand::ToggleAutoRefresh) => {
                        auto_refresh = toggle(handle, auto_refresh);
                    }
                    Some(WatchCommand::Quit) => break,
                    None => {
                        if !line.trim().is_empty() {
                            eprintln!("unknown command '{}' (r, t or q)", line.trim());
                        }
                    }
                },
                None => stdin = None,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Flip auto-refresh from the locally tracked value and return the new one.
fn toggle(handle: &RefreshHandle, current: bool) -> bool {
    let enabled = !current;
    handle.set_auto_refresh(enabled);
    eprintln!("auto-refresh {}", if enabled { "on" } else { "off" });
    enabled
}

async fn next_line(
    stdin: &mut Option<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
) -> Option<String> {
    match stdin {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

async fn wait_for_error(status_rx: &mut tokio::sync::watch::Receiver<EngineStatus>) {
    if status_rx.wait_for(EngineStatus::is_error).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn print_current(handle: &RefreshHandle, json: bool) -> anyhow::Result<()> {
    let Some(snapshot) = handle.current_snapshot() else {
        return Ok(());
    };
    if json {
        // one compact document per line
        println!("{}", serde_json::to_string(snapshot.as_ref())?);
        return Ok(());
    }
    let auto = if handle.auto_refresh() { "on" } else { "off" };
    println!(
        "── snapshot {} at {} [auto-refresh: {auto}] ──",
        snapshot.sequence,
        snapshot.built_at.with_timezone(&chrono::Local).format("%H:%M:%S")
    );
    print!("{}", status::render(&snapshot));
    Ok(())
}

fn print_status(handle: &RefreshHandle) {
    if let EngineStatus::Error(msg) = handle.status() {
        eprintln!("refresh failed: {msg}");
    }
}
