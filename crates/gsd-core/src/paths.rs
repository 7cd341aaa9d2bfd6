use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PLANNING_DIR: &str = ".planning";
pub const PHASES_DIR: &str = ".planning/phases";
pub const TODOS_PENDING_DIR: &str = ".planning/todos/pending";
pub const TODOS_DONE_DIR: &str = ".planning/todos/done";

pub const PROJECT_FILE: &str = ".planning/PROJECT.md";
pub const ROADMAP_FILE: &str = ".planning/ROADMAP.md";
pub const STATE_FILE: &str = ".planning/STATE.md";
pub const CONFIG_FILE: &str = ".planning/dashboard.yaml";

pub const MARKDOWN_EXT: &str = "md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn planning_dir(root: &Path) -> PathBuf {
    root.join(PLANNING_DIR)
}

pub fn phases_dir(root: &Path) -> PathBuf {
    root.join(PHASES_DIR)
}

pub fn todos_pending_dir(root: &Path) -> PathBuf {
    root.join(TODOS_PENDING_DIR)
}

pub fn todos_done_dir(root: &Path) -> PathBuf {
    root.join(TODOS_DONE_DIR)
}

pub fn project_path(root: &Path) -> PathBuf {
    root.join(PROJECT_FILE)
}

pub fn roadmap_path(root: &Path) -> PathBuf {
    root.join(ROADMAP_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXT))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Phase numbers
// ---------------------------------------------------------------------------

static PHASE_DIR_RE: OnceLock<Regex> = OnceLock::new();

fn phase_dir_re() -> &'static Regex {
    PHASE_DIR_RE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)*)(?:-(.*))?$").unwrap())
}

/// Split a phase directory name like `02.1-hotfix` into its number and slug.
/// Returns `None` when the name has no numeric prefix.
pub fn split_phase_dir_name(name: &str) -> Option<(String, String)> {
    let caps = phase_dir_re().captures(name)?;
    let number = caps.get(1)?.as_str().to_string();
    let slug = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Some((number, slug))
}

/// Canonical form of a phase number: leading zeros dropped per component,
/// so `03`, `3` and `003` compare equal, as do `02.1` and `2.1`.
pub fn normalize_phase_number(number: &str) -> String {
    number
        .trim()
        .split('.')
        .map(|part| {
            let trimmed = part.trim_start_matches('0');
            if trimmed.is_empty() {
                "0"
            } else {
                trimmed
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Numeric ordering of phase numbers (`2 < 2.1 < 10`). Components that fail
/// to parse sort as zero.
pub fn compare_phase_numbers(a: &str, b: &str) -> Ordering {
    let key = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    };
    key(a).cmp(&key(b))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
