use crate::parse::{Note, Parsed};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// Content-derived id; unaffected by edits to other lines.
    pub id: String,
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectTasks {
    /// Text of the first top-level heading, if any.
    pub title: Option<String>,
    pub tasks: Vec<Task>,
}

impl ProjectTasks {
    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.done).count()
    }
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static CHECKLIST_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(?P<hashes>#{1,6})\s+(?P<text>.+?)\s*#*$").unwrap())
}

fn checklist_re() -> &'static Regex {
    CHECKLIST_RE.get_or_init(|| Regex::new(r"^[-*+]\s+\[(?P<mark>[^\]]?)\]\s+(?P<text>.+)$").unwrap())
}

/// True when a checklist marker denotes completion.
pub fn is_done_marker(mark: &str) -> bool {
    matches!(mark, "x" | "X" | "✓" | "✔")
}

/// Parse PROJECT.md: checklist lines under the `Active` heading become tasks.
pub fn parse(text: &str) -> Parsed<ProjectTasks> {
    let mut notes = Vec::new();
    let mut title = None;
    let mut tasks = Vec::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();

    // Level of the Active heading while inside its section.
    let mut active_level: Option<usize> = None;
    let mut found_active = false;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();

        if let Some(caps) = heading_re().captures(line) {
            let level = caps["hashes"].len();
            let heading = caps["text"].trim();
            if level == 1 && title.is_none() {
                title = Some(heading.to_string());
            }
            if active_level.map(|l| level <= l).unwrap_or(false) {
                active_level = None;
            }
            if active_level.is_none() && heading.to_lowercase().starts_with("active") {
                active_level = Some(level);
                found_active = true;
            }
            continue;
        }

        if active_level.is_none() {
            continue;
        }

        let Some(caps) = checklist_re().captures(line) else {
            continue;
        };
        let item = caps["text"].trim().to_string();
        if item.is_empty() {
            notes.push(Note::at(i + 1, "empty checklist item skipped"));
            continue;
        }
        let base = task_id(&item);
        let n = occurrences.entry(base.clone()).or_insert(0);
        *n += 1;
        let id = if *n == 1 { base } else { format!("{base}-{n}") };
        tasks.push(Task {
            id,
            done: is_done_marker(&caps["mark"]),
            text: item,
        });
    }

    if !found_active {
        notes.push(Note::new("no 'Active' section found"));
    }

    Parsed::new(ProjectTasks { title, tasks }, notes)
}

/// `t-` followed by the first 8 hex digits of the SHA-256 of the
/// whitespace-normalized, lower-cased text.
fn task_id(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("t-{hex}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
