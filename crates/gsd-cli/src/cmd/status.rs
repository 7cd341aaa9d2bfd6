use crate::cmd::{build_snapshot, display_path};
use crate::output::print_json;
use gsd_core::ProjectSnapshot;
use std::fmt::Write;
use std::path::Path;

const BAR_WIDTH: usize = 20;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = build_snapshot(root)?;
    if json {
        return print_json(&snapshot);
    }
    print!("{}", render(&snapshot));
    Ok(())
}

pub fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Plain-text status block.
pub fn render(snap: &ProjectSnapshot) -> String {
    let mut out = String::new();
    let stats = &snap.stats;

    let name = snap.title.clone().unwrap_or_else(|| {
        snap.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| snap.root.display().to_string())
    });
    let _ = writeln!(out, "{name}");

    if let Some(label) = &stats.position.label {
        let _ = writeln!(out, "Position:      {label}");
    }
    if let Some(status) = &stats.status {
        let _ = writeln!(out, "Status:        {status}");
    }
    let _ = writeln!(
        out,
        "Progress:      {} {}%",
        progress_bar(stats.progress_percent),
        stats.progress_percent
    );
    let velocity = match stats.velocity {
        Some(v) => format!("{v:.2} per day"),
        None => "n/a".to_string(),
    };
    let _ = writeln!(out, "Velocity:      {velocity}");
    if let Some(avg) = &stats.average_duration {
        let _ = writeln!(out, "Avg duration:  {avg}");
    }
    match (&stats.last_activity_note, stats.last_activity) {
        (Some(note), _) => {
            let _ = writeln!(out, "Last activity: {note}");
        }
        (None, Some(at)) => {
            let _ = writeln!(out, "Last activity: {}", at.format("%Y-%m-%d %H:%M"));
        }
        (None, None) => {}
    }

    let current = match snap.current_phase() {
        Some(p) => format!("{} ({})", p.name, p.status),
        None => "none".to_string(),
    };
    let _ = writeln!(out, "Current phase: {current}");
    let _ = writeln!(out, "Phases:        {}/{} done", snap.phases_done(), snap.phases.len());
    let _ = writeln!(out, "Tasks:         {}/{} done", snap.tasks_done(), snap.tasks.len());
    let _ = writeln!(
        out,
        "Todos:         {} pending, {} done",
        snap.pending_todos.len(),
        snap.completed_todos.len()
    );

    if !stats.concerns.is_empty() {
        let _ = writeln!(out, "Concerns:");
        for c in &stats.concerns {
            let _ = writeln!(out, "  - {c}");
        }
    }

    if !snap.warnings.is_empty() {
        let _ = writeln!(out, "Warnings ({}):", snap.warnings.len());
        for w in &snap.warnings {
            let path = display_path(&snap.root, &w.source_path);
            match w.line {
                Some(line) => {
                    let _ = writeln!(out, "  {path}:{line}: {}", w.message);
                }
                None => {
                    let _ = writeln!(out, "  {path}: {}", w.message);
                }
            }
        }
    }
    out
}
