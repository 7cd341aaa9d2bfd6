use crate::parse::ParseWarning;
use crate::phase_doc::PhaseDoc;
use crate::project::Task;
use crate::roadmap::Phase;
use crate::state_doc::StateMetrics;
use crate::todo::Todo;
use crate::types::{DocKind, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything the dashboard knows about a project at one point in time.
///
/// Built once by [`crate::SnapshotBuilder`] and never mutated afterwards;
/// consumers share it behind an `Arc`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSnapshot {
    /// Per-builder counter; 0 for the first successful build.
    pub sequence: u64,
    pub built_at: DateTime<Utc>,
    pub root: PathBuf,
    pub title: Option<String>,
    pub phases: Vec<Phase>,
    /// Index into `phases`.
    pub current_phase: Option<usize>,
    pub tasks: Vec<Task>,
    pub pending_todos: Vec<Todo>,
    pub completed_todos: Vec<Todo>,
    pub stats: StateMetrics,
    /// Latest SUMMARY of the current phase.
    pub summary_doc: Option<String>,
    /// Current-phase documents; every `DocKind` is present as a key.
    pub phase_docs: BTreeMap<DocKind, Option<PhaseDoc>>,
    pub warnings: Vec<ParseWarning>,
}

impl ProjectSnapshot {
    pub fn current_phase(&self) -> Option<&Phase> {
        self.current_phase.and_then(|i| self.phases.get(i))
    }

    pub fn phase_doc(&self, kind: DocKind) -> Option<&PhaseDoc> {
        self.phase_docs.get(&kind).and_then(Option::as_ref)
    }

    pub fn phases_done(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Done)
            .count()
    }

    pub fn tasks_done(&self) -> usize {
        self.tasks.iter().filter(|t| t.done).count()
    }

    /// Equal in everything but `sequence` and `built_at`.
    pub fn same_content(&self, other: &ProjectSnapshot) -> bool {
        self.root == other.root
            && self.title == other.title
            && self.phases == other.phases
            && self.current_phase == other.current_phase
            && self.tasks == other.tasks
            && self.pending_todos == other.pending_todos
            && self.completed_todos == other.completed_todos
            && self.stats == other.stats
            && self.summary_doc == other.summary_doc
            && self.phase_docs == other.phase_docs
            && self.warnings == other.warnings
    }
}

/// A `phase_docs` map with every kind present and empty.
pub fn empty_phase_docs() -> BTreeMap<DocKind, Option<PhaseDoc>> {
    DocKind::all().iter().map(|k| (*k, None)).collect()
}
