//! Shared parser plumbing: the `Parsed<T>` envelope every parser returns, the
//! warnings the snapshot carries, and a kind-dispatching entry point.

use crate::phase_doc::{self, PhaseDoc};
use crate::project::{self, ProjectTasks};
use crate::roadmap::{self, Roadmap};
use crate::state_doc::{self, StateMetrics};
use crate::todo::{self, TodoFront};
use crate::types::DocumentKind;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_VELOCITY_WINDOW_DAYS: u32 = 7;

// ---------------------------------------------------------------------------
// Notes and warnings
// ---------------------------------------------------------------------------

/// A non-fatal parser finding, before it is tied to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// 1-based source line, when the finding is about a specific line.
    pub line: Option<usize>,
    pub message: String,
}

impl Note {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// A non-fatal problem recorded on a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub source_path: PathBuf,
    pub line: Option<usize>,
    pub message: String,
}

impl ParseWarning {
    pub fn new(source_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            line: None,
            message: message.into(),
        }
    }

    pub fn from_note(source_path: &Path, note: Note) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            line: note.line,
            message: note.message,
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.source_path.display(), line, self.message),
            None => write!(f, "{}: {}", self.source_path.display(), self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed<T>
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub notes: Vec<Note>,
}

impl<T> Parsed<T> {
    pub fn new(value: T, notes: Vec<Note>) -> Self {
        Self { value, notes }
    }

    pub fn clean(value: T) -> Self {
        Self {
            value,
            notes: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        Parsed {
            value: f(self.value),
            notes: self.notes,
        }
    }

    /// Split into the value and warnings attributed to `source`.
    pub fn into_parts(self, source: &Path) -> (T, Vec<ParseWarning>) {
        let warnings = self
            .notes
            .into_iter()
            .map(|note| ParseWarning::from_note(source, note))
            .collect();
        (self.value, warnings)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Trailing window, in days, used for the velocity rate.
    pub velocity_window_days: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            velocity_window_days: DEFAULT_VELOCITY_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDocument {
    Project(ProjectTasks),
    Roadmap(Roadmap),
    State(StateMetrics),
    Todo(TodoFront),
    Phase(PhaseDoc),
}

impl ParsedDocument {
    pub fn into_project(self) -> Option<ProjectTasks> {
        match self {
            ParsedDocument::Project(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_roadmap(self) -> Option<Roadmap> {
        match self {
            ParsedDocument::Roadmap(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_state(self) -> Option<StateMetrics> {
        match self {
            ParsedDocument::State(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_todo(self) -> Option<TodoFront> {
        match self {
            ParsedDocument::Todo(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_phase(self) -> Option<PhaseDoc> {
        match self {
            ParsedDocument::Phase(v) => Some(v),
            _ => None,
        }
    }
}

/// Parse `text` as a document of `kind`. Never fails: problems become notes.
pub fn parse_document(kind: DocumentKind, text: &str, options: &ParseOptions) -> Parsed<ParsedDocument> {
    match kind {
        DocumentKind::Project => project::parse(text).map(ParsedDocument::Project),
        DocumentKind::Roadmap => roadmap::parse(text).map(ParsedDocument::Roadmap),
        DocumentKind::State => state_doc::parse(text, options).map(ParsedDocument::State),
        DocumentKind::Todo => todo::parse(text).map(ParsedDocument::Todo),
        DocumentKind::Phase(doc) => phase_doc::parse(doc, text).map(ParsedDocument::Phase),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
