use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Done,
    Blocked,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Done => "done",
            PhaseStatus::Blocked => "blocked",
        }
    }

    /// Single-cell glyph used by text renderers.
    pub fn glyph(self) -> char {
        match self {
            PhaseStatus::Pending => '○',
            PhaseStatus::InProgress => '◐',
            PhaseStatus::Done => '●',
            PhaseStatus::Blocked => '✗',
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocKind
// ---------------------------------------------------------------------------

/// Phase-scoped document kinds, in the order a phase produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Context,
    Research,
    Plan,
    Verification,
    Summary,
}

impl DocKind {
    pub fn all() -> &'static [DocKind] {
        &[
            DocKind::Context,
            DocKind::Research,
            DocKind::Plan,
            DocKind::Verification,
            DocKind::Summary,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Context => "context",
            DocKind::Research => "research",
            DocKind::Plan => "plan",
            DocKind::Verification => "verification",
            DocKind::Summary => "summary",
        }
    }

    /// Upper-case file name suffix, e.g. `CONTEXT.md` for `03-CONTEXT.md`.
    pub fn file_suffix(self) -> &'static str {
        match self {
            DocKind::Context => "CONTEXT.md",
            DocKind::Research => "RESEARCH.md",
            DocKind::Plan => "PLAN.md",
            DocKind::Verification => "VERIFICATION.md",
            DocKind::Summary => "SUMMARY.md",
        }
    }

    /// Classify a phase document by file name. Matches `<prefix>-KIND.md`
    /// and a bare `KIND.md`.
    pub fn from_file_name(name: &str) -> Option<DocKind> {
        DocKind::all().iter().copied().find(|kind| {
            let suffix = kind.file_suffix();
            name == suffix
                || name
                    .strip_suffix(suffix)
                    .map(|prefix| prefix.ends_with('-'))
                    .unwrap_or(false)
        })
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocKind {
    type Err = crate::error::GsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "context" | "discuss" => Ok(DocKind::Context),
            "research" => Ok(DocKind::Research),
            "plan" | "plans" => Ok(DocKind::Plan),
            "verification" | "verify" | "review" => Ok(DocKind::Verification),
            "summary" => Ok(DocKind::Summary),
            _ => Err(crate::error::GsdError::UnknownDocKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentKind
// ---------------------------------------------------------------------------

/// Every document the parsers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "doc")]
pub enum DocumentKind {
    Project,
    Roadmap,
    State,
    Todo,
    Phase(DocKind),
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Project => f.write_str("project"),
            DocumentKind::Roadmap => f.write_str("roadmap"),
            DocumentKind::State => f.write_str("state"),
            DocumentKind::Todo => f.write_str("todo"),
            DocumentKind::Phase(kind) => write!(f, "phase {kind}"),
        }
    }
}

// ---------------------------------------------------------------------------
// TodoStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    Done,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoStatus::Pending => "pending",
            TodoStatus::Done => "done",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
