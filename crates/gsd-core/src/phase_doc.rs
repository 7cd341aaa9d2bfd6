use crate::parse::{Note, Parsed};
use crate::types::DocKind;
use serde::Serialize;
use std::path::PathBuf;

/// One phase-scoped document (or, for plans, every plan file joined).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDoc {
    pub kind: DocKind,
    /// First `# ` heading.
    pub title: Option<String>,
    pub body: String,
    /// Files the body was read from; filled in by the builder.
    pub sources: Vec<PathBuf>,
}

impl PhaseDoc {
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

pub fn parse(kind: DocKind, text: &str) -> Parsed<PhaseDoc> {
    let mut notes = Vec::new();
    if text.trim().is_empty() {
        notes.push(Note::new(format!("{kind} document is empty")));
    }
    let title = text
        .lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Parsed::new(
        PhaseDoc {
            kind,
            title,
            body: text.to_string(),
            sources: Vec::new(),
        },
        notes,
    )
}

/// Join several documents of one kind into a single view. Each part is
/// introduced by its file name and followed by a horizontal rule; `parts` is
/// expected in file-name order.
pub fn merge(kind: DocKind, parts: Vec<(String, PhaseDoc)>) -> Option<PhaseDoc> {
    if parts.len() <= 1 {
        return parts.into_iter().next().map(|(_, doc)| doc);
    }
    let title = parts.first().and_then(|(_, d)| d.title.clone());
    let mut body = String::new();
    let mut sources = Vec::new();
    for (name, doc) in parts {
        body.push_str(&format!("# {name}\n\n{}\n\n---\n\n", doc.body.trim_end()));
        sources.extend(doc.sources);
    }
    Some(PhaseDoc {
        kind,
        title,
        body,
        sources,
    })
}
