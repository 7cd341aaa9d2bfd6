use gsd_core::paths::PLANNING_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `GSD_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.planning/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_planning_root(&cwd).unwrap_or(cwd)
}

/// Nearest ancestor of `start` (inclusive) that has a `.planning/` directory.
pub fn find_planning_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PLANNING_DIR).is_dir())
        .map(Path::to_path_buf)
}
