//! ROADMAP.md: the ordered phase list.
//!
//! Three line shapes are recognised, tried in this order on every line:
//!
//! ```text
//! - [x] **Phase 1: Setup** - Initial setup          checkbox
//! - SHIPPED **v1.0 Core** — Phases 1-3              shipped milestone
//! | 2. Features | v1.0 | 3/5 | In Progress |         progress table row
//! ```
//!
//! Phase numbers restart after a shipped milestone, so a number repeated
//! since the last milestone line (a checkbox list followed by a progress
//! table, for instance) is the same phase and is not added twice.

use crate::parse::{Note, Parsed};
use crate::paths::normalize_phase_number;
use crate::types::PhaseStatus;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    /// Position in ROADMAP.md order; the phase identity.
    pub index: usize,
    /// Phase number as written (`3`, `2.1`), absent for milestone lines.
    pub number: Option<String>,
    pub name: String,
    pub description: String,
    pub status: PhaseStatus,
    /// Collapsed milestone entry (`SHIPPED` / `✅` line).
    pub shipped: bool,
    /// 1-based line in ROADMAP.md.
    pub line: usize,
    /// Matching `phases/` subdirectory, filled in by the snapshot builder.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Roadmap {
    pub phases: Vec<Phase>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static CHECKBOX_RE: OnceLock<Regex> = OnceLock::new();
static SHIPPED_RE: OnceLock<Regex> = OnceLock::new();
static TABLE_PHASE_RE: OnceLock<Regex> = OnceLock::new();

fn checkbox_re() -> &'static Regex {
    CHECKBOX_RE.get_or_init(|| {
        Regex::new(
            r"^[-*]\s+\[(?P<marker>[^\]]*)\]\s*\*\*(?P<name>Phase\s+(?P<num>\d+(?:\.\d+)*)\s*:.*?)\*\*(?:\s*[-—–:]?\s*(?P<desc>.*))?$",
        )
        .unwrap()
    })
}

fn shipped_re() -> &'static Regex {
    SHIPPED_RE.get_or_init(|| {
        Regex::new(
            r"^[-*]\s+(?:SHIPPED|✅)\s+\*\*(?P<version>v\d+(?:\.\d+)*)\s+(?P<name>[^*]*?)\*\*\s*[-—–]\s*(?P<desc>.+)$",
        )
        .unwrap()
    })
}

fn table_phase_re() -> &'static Regex {
    TABLE_PHASE_RE.get_or_init(|| {
        Regex::new(r"^(?:Phase\s+)?(?P<num>\d+(?:\.\d+)*)\s*[.:\-—–]\s*(?P<title>.+)$").unwrap()
    })
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Map a checkbox marker to a status. `None` for markers outside the vocabulary.
pub fn status_from_marker(marker: &str) -> Option<PhaseStatus> {
    match marker.trim() {
        "x" | "X" | "✓" | "✔" | "✅" => Some(PhaseStatus::Done),
        "/" | "~" | "-" | "🚧" | "◐" => Some(PhaseStatus::InProgress),
        "!" | "b" | "B" | "⛔" | "🚫" => Some(PhaseStatus::Blocked),
        "" if marker == " " => Some(PhaseStatus::Pending),
        _ => None,
    }
}

/// Map free-form status text from a table cell. `None` when unrecognised.
pub fn status_from_text(text: &str) -> Option<PhaseStatus> {
    let t = text.trim().to_lowercase();
    if t.contains("blocked") || t.contains('⛔') || t.contains('🚫') {
        return Some(PhaseStatus::Blocked);
    }
    const PENDING: &[&str] = &["not started", "pending", "planned", "todo", "tbd", "queued", "deferred"];
    if t.is_empty() || t == "-" || PENDING.iter().any(|w| t.contains(w)) {
        return Some(PhaseStatus::Pending);
    }
    if t.contains("incomplete") {
        return Some(PhaseStatus::InProgress);
    }
    const DONE: &[&str] = &["complete", "shipped", "done", "verified", "✓", "✔", "✅"];
    if DONE.iter().any(|w| t.contains(w)) {
        return Some(PhaseStatus::Done);
    }
    const ACTIVE: &[&str] = &["progress", "active", "executing", "planning", "ongoing", "wip", "🚧"];
    if ACTIVE.iter().any(|w| t.contains(w)) {
        return Some(PhaseStatus::InProgress);
    }
    None
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Candidate {
    number: Option<String>,
    name: String,
    description: String,
    status: PhaseStatus,
    shipped: bool,
}

#[derive(Default)]
struct TableState {
    in_table: bool,
    status_column: Option<usize>,
}

pub fn parse(text: &str) -> Parsed<Roadmap> {
    let mut phases: Vec<Phase> = Vec::new();
    let mut notes = Vec::new();
    let mut seen_numbers: HashSet<String> = HashSet::new();
    let mut table = TableState::default();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();

        if !line.starts_with('|') {
            table = TableState::default();
        }

        let candidate = if let Some(c) = parse_checkbox(line, line_no, &mut notes) {
            Some(c)
        } else if let Some(c) = parse_shipped(line) {
            seen_numbers.clear();
            Some(c)
        } else if line.starts_with('|') {
            parse_table_row(line, line_no, &mut table, &mut notes)
        } else {
            None
        };

        let Some(c) = candidate else { continue };

        if let Some(number) = &c.number {
            if !seen_numbers.insert(normalize_phase_number(number)) {
                tracing::debug!(line = line_no, number = %number, "roadmap phase listed twice, keeping first");
                continue;
            }
        }

        phases.push(Phase {
            index: phases.len(),
            number: c.number,
            name: c.name,
            description: c.description,
            status: c.status,
            shipped: c.shipped,
            line: line_no,
            directory: None,
        });
    }

    if phases.is_empty() {
        notes.push(Note::new("no phase entries found"));
    }

    Parsed::new(Roadmap { phases }, notes)
}

fn parse_checkbox(line: &str, line_no: usize, notes: &mut Vec<Note>) -> Option<Candidate> {
    let caps = checkbox_re().captures(line)?;
    let marker = caps.name("marker").map(|m| m.as_str()).unwrap_or_default();
    let status = status_from_marker(marker).unwrap_or_else(|| {
        notes.push(Note::at(
            line_no,
            format!("unrecognized status marker '[{marker}]', treating phase as pending"),
        ));
        PhaseStatus::Pending
    });
    Some(Candidate {
        number: caps.name("num").map(|m| m.as_str().to_string()),
        name: caps["name"].trim().to_string(),
        description: caps
            .name("desc")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        status,
        shipped: false,
    })
}

fn parse_shipped(line: &str) -> Option<Candidate> {
    let caps = shipped_re().captures(line)?;
    Some(Candidate {
        number: None,
        name: format!("{} {}", &caps["version"], caps["name"].trim()),
        description: caps["desc"].trim().to_string(),
        status: PhaseStatus::Done,
        shipped: true,
    })
}

fn parse_table_row(
    line: &str,
    line_no: usize,
    table: &mut TableState,
    notes: &mut Vec<Note>,
) -> Option<Candidate> {
    let cells: Vec<&str> = line
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim())
        .collect();

    if cells.iter().all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' '))) {
        return None;
    }

    let first = cells.first().copied().unwrap_or_default();
    if !table.in_table {
        table.in_table = true;
        if first.to_lowercase().contains("phase") && table_phase_re().captures(first).is_none() {
            table.status_column = cells
                .iter()
                .position(|c| c.to_lowercase().contains("status"));
            return None;
        }
    }

    if cells.len() < 2 {
        return None;
    }
    let caps = table_phase_re().captures(first)?;
    let number = caps["num"].to_string();
    let title = caps["title"].trim().to_string();

    let column = table
        .status_column
        .unwrap_or(if cells.len() >= 4 { 3 } else { cells.len() - 1 });
    let status_text = cells.get(column).copied().unwrap_or_default();
    let status = status_from_text(status_text).unwrap_or_else(|| {
        notes.push(Note::at(
            line_no,
            format!("unrecognized phase status '{status_text}', treating phase as pending"),
        ));
        PhaseStatus::Pending
    });

    Some(Candidate {
        name: format!("Phase {number}: {title}"),
        number: Some(number),
        description: String::new(),
        status,
        shipped: false,
    })
}

// ---------------------------------------------------------------------------
// Current phase
// ---------------------------------------------------------------------------

/// The phase the dashboard treats as active.
///
/// First `InProgress` phase; otherwise the `Pending` phase right after the
/// last `Done` one (or the first phase when nothing is done yet); otherwise
/// none.
pub fn current_phase_index(phases: &[Phase]) -> Option<usize> {
    if let Some(p) = phases.iter().find(|p| p.status == PhaseStatus::InProgress) {
        return Some(p.index);
    }
    let next = match phases.iter().rposition(|p| p.status == PhaseStatus::Done) {
        Some(last_done) => last_done + 1,
        None => 0,
    };
    phases
        .get(next)
        .filter(|p| p.status == PhaseStatus::Pending)
        .map(|p| p.index)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn phases(text: &str) -> Vec<Phase> {
        parse(text).value.phases
    }

    fn with_statuses(statuses: &[PhaseStatus]) -> Vec<Phase> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Phase {
                index: i,
                number: Some((i + 1).to_string()),
                name: format!("Phase {}", i + 1),
                description: String::new(),
                status: *s,
                shipped: false,
                line: i + 1,
                directory: None,
            })
            .collect()
    }

    #[test]
    fn checkbox_completed() {
        let p = phases("- [x] **Phase 1: Setup** - Initial setup\n");
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].name, "Phase 1: Setup");
        assert_eq!(p[0].number.as_deref(), Some("1"));
        assert_eq!(p[0].description, "Initial setup");
        assert_eq!(p[0].status, PhaseStatus::Done);
    }

    #[test]
    fn checkbox_pending_without_description() {
        let p = phases("- [ ] **Phase 2: Implementation**\n");
        assert_eq!(p[0].name, "Phase 2: Implementation");
        assert_eq!(p[0].description, "");
        assert_eq!(p[0].status, PhaseStatus::Pending);
    }

    #[test]
    fn checkbox_in_progress_decimal_and_whitespace() {
        let p = phases("- [/] **Phase 3: Testing** - Run tests\n- [x]  **Phase 3.1: Hotfix**  -  Emergency fix\n");
        assert_eq!(p[0].status, PhaseStatus::InProgress);
        assert_eq!(p[1].number.as_deref(), Some("3.1"));
        assert_eq!(p[1].description, "Emergency fix");
        assert_eq!(p[1].status, PhaseStatus::Done);
    }

    #[test]
    fn blocked_marker() {
        let p = phases("- [!] **Phase 4: Deploy** - waiting on infra\n");
        assert_eq!(p[0].status, PhaseStatus::Blocked);
    }

    #[test]
    fn unknown_marker_defaults_to_pending_with_note() {
        let parsed = parse("- [?] **Phase 1: Mystery**\n");
        assert_eq!(parsed.value.phases[0].status, PhaseStatus::Pending);
        assert_eq!(parsed.notes.len(), 1);
        assert_eq!(parsed.notes[0].line, Some(1));
    }

    #[test]
    fn table_with_status_header() {
        let text = "# Progress\n\n| Phase | Milestone | Plans | Status |\n|-------|-----------|-------|--------|\n| 1. Setup | v2.0 | 1/1 | Complete |\n| 2. Core | v2.0 | 0/3 | In Progress |\n| 3. UI | v2.0 | 0/2 | Not started |\n";
        let parsed = parse(text);
        assert!(parsed.notes.is_empty(), "{:?}", parsed.notes);
        let p = parsed.value.phases;
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].name, "Phase 1: Setup");
        assert_eq!(p[0].status, PhaseStatus::Done);
        assert_eq!(p[1].status, PhaseStatus::InProgress);
        assert_eq!(p[2].status, PhaseStatus::Pending);
    }

    #[test]
    fn table_dash_names_and_moved_status_column() {
        let text = "| Phase | Status | Requirements | Success Criteria | Completion |\n|-------|--------|--------------|------------------|------------|\n| 1 - Foundation & Type Safety | ✓ Complete (2026-02-14) | 5 | 5 | 100% |\n| 2 - LLM Provider Migration | Planned | 3 | 5 | 0% |\n| 3 - MCP Server Integration | Pending | 7 | 6 | 0% |\n";
        let p = phases(text);
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].name, "Phase 1: Foundation & Type Safety");
        assert_eq!(p[0].status, PhaseStatus::Done);
        assert_eq!(p[1].status, PhaseStatus::Pending);
        assert_eq!(p[2].name, "Phase 3: MCP Server Integration");
    }

    #[test]
    fn table_shipped_is_done() {
        let p = phases("| Phase | Milestone | Plans | Status |\n|---|---|---|---|\n| 1. Core | v1.0 | 5/5 | Shipped |\n");
        assert_eq!(p[0].status, PhaseStatus::Done);
    }

    #[test]
    fn shipped_milestone_then_new_numbering() {
        let text = "# Roadmap\n\n## Shipped Milestones\n\n- SHIPPED **v1.0 Core Features** — Phases 1-3\n\n## Current Milestone: v2.0\n\n- [x] **Phase 1: Refactor** - Code cleanup\n- [ ] **Phase 2: New Feature** - Add feature\n";
        let p = phases(text);
        assert_eq!(p.len(), 3);
        assert!(p[0].shipped);
        assert_eq!(p[0].name, "v1.0 Core Features");
        assert_eq!(p[0].description, "Phases 1-3");
        assert_eq!(p[0].status, PhaseStatus::Done);
        assert_eq!(p[1].name, "Phase 1: Refactor");
        assert_eq!(p[2].status, PhaseStatus::Pending);
        assert_eq!(p.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn mixed_formats() {
        let text = "- SHIPPED **v1.0 Core** — Phases 1-3\n\n| Phase | Milestone | Plans | Status |\n|-------|-----------|-------|--------|\n| 1. Migration | v2.0 | 2/2 | Complete |\n\n- [/] **Phase 2: New Features** - Adding features\n- [ ] **Phase 3: Testing** - Test everything\n";
        assert_eq!(phases(text).len(), 4);
    }

    #[test]
    fn progress_table_repeating_checkbox_phases_is_not_duplicated() {
        let text = "- [x] **Phase 1: Setup**\n- [ ] **Phase 2: Build**\n\n| Phase | Plans Complete | Status | Completed |\n|---|---|---|---|\n| 1. Setup | 2/2 | Complete | 2026-01-10 |\n| 2. Build | 0/3 | Not started | - |\n";
        assert_eq!(phases(text).len(), 2);
    }

    #[test]
    fn empty_roadmap_notes_absence() {
        let parsed = parse("# Roadmap\n\nNothing planned yet.\n");
        assert!(parsed.value.phases.is_empty());
        assert_eq!(parsed.notes.len(), 1);
    }

    #[test]
    fn plan_checklists_are_not_phases() {
        let p = phases("### Phase 1: Setup\n\nPlans:\n- [ ] 01-01: scaffold\n- [x] 01-02: ci\n");
        assert!(p.is_empty());
    }

    #[test]
    fn current_phase_prefers_in_progress() {
        use PhaseStatus::*;
        let p = with_statuses(&[Done, Done, InProgress, Pending, Pending]);
        assert_eq!(current_phase_index(&p), Some(2));
    }

    #[test]
    fn current_phase_none_when_all_done() {
        use PhaseStatus::*;
        assert_eq!(current_phase_index(&with_statuses(&[Done, Done])), None);
    }

    #[test]
    fn current_phase_after_last_done() {
        use PhaseStatus::*;
        let p = with_statuses(&[Done, Pending, Done, Pending, Pending]);
        assert_eq!(current_phase_index(&p), Some(3));
        assert_eq!(current_phase_index(&with_statuses(&[Pending, Pending])), Some(0));
        assert_eq!(current_phase_index(&with_statuses(&[Done, Blocked, Pending])), None);
        assert_eq!(current_phase_index(&[]), None);
    }

    #[test]
    fn table_status_vocabulary() {
        assert_eq!(status_from_text("Incomplete"), Some(PhaseStatus::InProgress));
        assert_eq!(status_from_text("Blocked on API"), Some(PhaseStatus::Blocked));
        assert_eq!(status_from_text("✅"), Some(PhaseStatus::Done));
        assert_eq!(status_from_text(""), Some(PhaseStatus::Pending));
        assert_eq!(status_from_text("sideways"), None);
    }
}
