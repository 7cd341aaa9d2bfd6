//! Turns a located project into a [`ProjectSnapshot`].
//!
//! A build reads every file once. Unreadable or malformed inputs become
//! warnings plus default values; only a missing `.planning/` directory fails.

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::locator::{self, PhaseDir, ProjectLayout};
use crate::parse::{parse_document, ParseOptions, ParseWarning, ParsedDocument};
use crate::phase_doc::{self, PhaseDoc};
use crate::roadmap;
use crate::snapshot::{empty_phase_docs, ProjectSnapshot};
use crate::todo::{self, Todo};
use crate::types::{DocKind, DocumentKind, TodoStatus};
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct SnapshotBuilder {
    root: PathBuf,
    options: ParseOptions,
    next_sequence: u64,
}

impl SnapshotBuilder {
    pub fn new(root: impl Into<PathBuf>, config: &DashboardConfig) -> Self {
        Self {
            root: root.into(),
            options: config.parse_options(),
            next_sequence: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the next snapshot. The sequence advances only on success.
    pub fn build(&mut self) -> Result<ProjectSnapshot> {
        let layout = locator::locate(&self.root)?;
        let snapshot = assemble(layout, &self.options, self.next_sequence);
        self.next_sequence += 1;
        debug!(
            sequence = snapshot.sequence,
            phases = snapshot.phases.len(),
            warnings = snapshot.warnings.len(),
            "snapshot built"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn assemble(layout: ProjectLayout, options: &ParseOptions, sequence: u64) -> ProjectSnapshot {
    let mut warnings = layout.warnings.clone();

    let project = read_document(&layout.project, DocumentKind::Project, options, &mut warnings)
        .and_then(ParsedDocument::into_project)
        .unwrap_or_default();

    let roadmap = read_document(&layout.roadmap, DocumentKind::Roadmap, options, &mut warnings)
        .and_then(ParsedDocument::into_roadmap)
        .unwrap_or_default();

    let stats = read_document(&layout.state, DocumentKind::State, options, &mut warnings)
        .and_then(ParsedDocument::into_state)
        .unwrap_or_default();

    let mut phases = roadmap.phases;
    for phase in phases.iter_mut().filter(|p| !p.shipped) {
        phase.directory = layout
            .phase_dir_for(phase.number.as_deref(), phase.index)
            .map(|d| d.path.clone());
    }

    let current_phase = roadmap::current_phase_index(&phases);
    let current_dir = current_phase
        .and_then(|i| phases.get(i))
        .filter(|p| !p.shipped)
        .and_then(|p| layout.phase_dir_for(p.number.as_deref(), p.index));

    let mut phase_docs = empty_phase_docs();
    let mut summary_doc = None;
    if let Some(dir) = current_dir {
        for kind in DocKind::all() {
            let doc = load_phase_doc(dir, *kind, options, &mut warnings);
            if *kind == DocKind::Summary {
                summary_doc = doc.as_ref().map(|d| d.body.clone());
            }
            phase_docs.insert(*kind, doc);
        }
    }

    let pending_todos = load_todos(&layout.pending_todos, TodoStatus::Pending, options, &mut warnings);
    let completed_todos = load_todos(&layout.done_todos, TodoStatus::Done, options, &mut warnings);

    ProjectSnapshot {
        sequence,
        built_at: Utc::now(),
        root: layout.root,
        title: project.title,
        phases,
        current_phase,
        tasks: project.tasks,
        pending_todos,
        completed_todos,
        stats,
        summary_doc,
        phase_docs,
        warnings,
    }
}

fn collect<T>((value, mut found): (T, Vec<ParseWarning>), warnings: &mut Vec<ParseWarning>) -> T {
    warnings.append(&mut found);
    value
}

/// Read a file, recording a warning instead of failing.
fn read_text(path: &Path, warnings: &mut Vec<ParseWarning>) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(file = %path.display(), "planning file missing");
            warnings.push(ParseWarning::new(path, "file not found"));
            None
        }
        Err(e) => {
            debug!(file = %path.display(), error = %e, "planning file unreadable");
            warnings.push(ParseWarning::new(path, format!("cannot read file: {e}")));
            None
        }
    }
}

/// Read and parse one file as `kind`; parser notes land in `warnings`.
fn read_document(
    path: &Path,
    kind: DocumentKind,
    options: &ParseOptions,
    warnings: &mut Vec<ParseWarning>,
) -> Option<ParsedDocument> {
    let text = read_text(path, warnings)?;
    Some(collect(parse_document(kind, &text, options).into_parts(path), warnings))
}

fn load_phase_doc(
    dir: &PhaseDir,
    kind: DocKind,
    options: &ParseOptions,
    warnings: &mut Vec<ParseWarning>,
) -> Option<PhaseDoc> {
    let paths: Vec<&PathBuf> = match kind {
        DocKind::Plan => dir.docs(kind).iter().collect(),
        DocKind::Summary => dir.docs(kind).last().into_iter().collect(),
        _ => dir.docs(kind).first().into_iter().collect(),
    };

    let mut parts = Vec::new();
    for path in paths {
        let Some(mut doc) =
            read_document(path, DocumentKind::Phase(kind), options, warnings).and_then(ParsedDocument::into_phase)
        else {
            continue;
        };
        doc.sources = vec![path.clone()];
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parts.push((name, doc));
    }
    phase_doc::merge(kind, parts)
}

fn load_todos(
    files: &[PathBuf],
    status: TodoStatus,
    options: &ParseOptions,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Todo> {
    let mut todos: Vec<Todo> = files
        .iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            let front = read_document(path, DocumentKind::Todo, options, warnings)
                .and_then(ParsedDocument::into_todo)
                .unwrap_or_default();
            Some(Todo::from_file(&stem, front, status))
        })
        .collect();
    todo::sort_todos(&mut todos);
    todos
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
