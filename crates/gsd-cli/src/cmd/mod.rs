pub mod doc;
pub mod phases;
pub mod status;
pub mod todos;
pub mod watch;

use anyhow::Context;
use gsd_core::{paths, DashboardConfig, GsdError, ProjectSnapshot, SnapshotBuilder};
use std::path::Path;

/// Load `.planning/dashboard.yaml`, logging validation warnings.
pub fn load_config(root: &Path) -> anyhow::Result<DashboardConfig> {
    let config = DashboardConfig::load(root).context("failed to load dashboard config")?;
    for w in config.validate() {
        tracing::warn!("{}", w.message);
    }
    Ok(config)
}

/// Fail early, with the typed error, when `root` is not a GSD project.
pub fn ensure_project(root: &Path) -> anyhow::Result<()> {
    if paths::planning_dir(root).is_dir() {
        Ok(())
    } else {
        Err(GsdError::NotAGsdProject {
            root: root.to_path_buf(),
        }
        .into())
    }
}

/// One-shot build for the non-interactive commands.
pub fn build_snapshot(root: &Path) -> anyhow::Result<ProjectSnapshot> {
    ensure_project(root)?;
    let config = load_config(root)?;
    let snapshot = SnapshotBuilder::new(root, &config)
        .build()
        .context("failed to build snapshot")?;
    Ok(snapshot)
}

/// `path` relative to `root` when possible, for display.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
