//! Discovery of the files a snapshot is built from.
//!
//! The only hard failure is a root without `.planning/`. Everything below it is
//! best effort: directories that cannot be listed turn into warnings and an
//! empty listing.

use crate::error::{GsdError, Result};
use crate::parse::ParseWarning;
use crate::paths;
use crate::types::DocKind;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A `phases/<N>-<slug>/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDir {
    /// Number as written in the directory name (`03`, `02.1`).
    pub number: String,
    pub slug: String,
    pub path: PathBuf,
    /// Classified documents, each list sorted by file name.
    pub files: BTreeMap<DocKind, Vec<PathBuf>>,
}

impl PhaseDir {
    pub fn docs(&self, kind: DocKind) -> &[PathBuf] {
        self.files.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The lexicographically-latest summary.
    pub fn latest_summary(&self) -> Option<&Path> {
        self.docs(DocKind::Summary).last().map(PathBuf::as_path)
    }

    pub fn matches_number(&self, number: &str) -> bool {
        paths::normalize_phase_number(&self.number) == paths::normalize_phase_number(number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub project: PathBuf,
    pub roadmap: PathBuf,
    pub state: PathBuf,
    /// Sorted by numeric prefix, ties broken by directory name.
    pub phase_dirs: Vec<PhaseDir>,
    pub pending_todos: Vec<PathBuf>,
    pub done_todos: Vec<PathBuf>,
    pub warnings: Vec<ParseWarning>,
}

impl ProjectLayout {
    /// Directory for a roadmap phase: by normalized number, or by roadmap
    /// position when the phase has no number.
    pub fn phase_dir_for(&self, number: Option<&str>, position: usize) -> Option<&PhaseDir> {
        match number {
            Some(n) => self.phase_dirs.iter().find(|d| d.matches_number(n)),
            None => self.phase_dirs.get(position),
        }
    }
}

/// Resolve every input file under `root`.
pub fn locate(root: &Path) -> Result<ProjectLayout> {
    let planning = paths::planning_dir(root);
    if !planning.is_dir() {
        return Err(GsdError::NotAGsdProject {
            root: root.to_path_buf(),
        });
    }

    let mut warnings = Vec::new();
    let phase_dirs = list_phase_dirs(&paths::phases_dir(root), &mut warnings);
    let pending_todos = list_markdown(&paths::todos_pending_dir(root), &mut warnings);
    let done_todos = list_markdown(&paths::todos_done_dir(root), &mut warnings);

    debug!(
        root = %root.display(),
        phase_dirs = phase_dirs.len(),
        pending = pending_todos.len(),
        done = done_todos.len(),
        "located planning files"
    );

    Ok(ProjectLayout {
        root: root.to_path_buf(),
        project: paths::project_path(root),
        roadmap: paths::roadmap_path(root),
        state: paths::state_path(root),
        phase_dirs,
        pending_todos,
        done_todos,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Entries of `dir`; a missing directory is an empty listing.
fn read_entries(dir: &Path, warnings: &mut Vec<ParseWarning>) -> Vec<std::fs::DirEntry> {
    let iter = match std::fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warnings.push(ParseWarning::new(dir, format!("cannot list directory: {e}")));
            return Vec::new();
        }
    };
    let mut entries = Vec::new();
    for entry in iter {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) => warnings.push(ParseWarning::new(dir, format!("cannot read entry: {e}"))),
        }
    }
    entries
}

fn is_dir(entry: &std::fs::DirEntry) -> bool {
    // follow symlinks so a linked phase directory still counts
    entry.path().is_dir()
}

fn list_markdown(dir: &Path, warnings: &mut Vec<ParseWarning>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = read_entries(dir, warnings)
        .into_iter()
        .filter(|e| !is_dir(e))
        .map(|e| e.path())
        .filter(|p| paths::is_markdown(p))
        .collect();
    files.sort();
    files
}

fn list_phase_dirs(dir: &Path, warnings: &mut Vec<ParseWarning>) -> Vec<PhaseDir> {
    let mut phase_dirs = Vec::new();
    for entry in read_entries(dir, warnings) {
        if !is_dir(&entry) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((number, slug)) = paths::split_phase_dir_name(&name) else {
            debug!(dir = %name, "skipping phases/ entry without numeric prefix");
            continue;
        };
        let path = entry.path();
        let files = classify_docs(&path, warnings);
        phase_dirs.push(PhaseDir {
            number,
            slug,
            path,
            files,
        });
    }
    phase_dirs.sort_by(|a, b| {
        paths::compare_phase_numbers(&a.number, &b.number).then_with(|| a.path.cmp(&b.path))
    });
    phase_dirs
}

fn classify_docs(dir: &Path, warnings: &mut Vec<ParseWarning>) -> BTreeMap<DocKind, Vec<PathBuf>> {
    let mut files: BTreeMap<DocKind, Vec<PathBuf>> = BTreeMap::new();
    for path in list_markdown(dir, warnings) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match DocKind::from_file_name(name) {
            Some(kind) => files.entry(kind).or_default().push(path),
            None => debug!(file = %path.display(), "unclassified phase document"),
        }
    }
    // list_markdown sorted the paths, so each bucket is already in name order
    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# x\n").unwrap();
    }

    #[test]
    fn missing_planning_dir_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = locate(dir.path()).unwrap_err();
        assert!(matches!(err, GsdError::NotAGsdProject { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_planning_dir_has_no_warnings() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".planning")).unwrap();
        let layout = locate(dir.path()).unwrap();
        assert!(layout.phase_dirs.is_empty());
        assert!(layout.pending_todos.is_empty());
        assert!(layout.warnings.is_empty());
    }

    #[test]
    fn phase_dirs_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, ".planning/phases/10-polish/10-CONTEXT.md");
        touch(root, ".planning/phases/02-core/02-CONTEXT.md");
        touch(root, ".planning/phases/02.1-hotfix/02.1-PLAN.md");
        touch(root, ".planning/phases/notes/README.md");
        fs::write(root.join(".planning/phases/03-stray.md"), "").unwrap();

        let layout = locate(root).unwrap();
        let numbers: Vec<_> = layout.phase_dirs.iter().map(|d| d.number.as_str()).collect();
        assert_eq!(numbers, vec!["02", "02.1", "10"]);
        assert_eq!(layout.phase_dirs[0].slug, "core");
    }

    #[test]
    fn documents_are_classified() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for f in [
            "03-CONTEXT.md",
            "03-RESEARCH.md",
            "03-02-PLAN.md",
            "03-01-PLAN.md",
            "03-VERIFICATION.md",
            "03-01-SUMMARY.md",
            "03-02-SUMMARY.md",
            "notes.md",
            "diagram.png",
        ] {
            touch(root, &format!(".planning/phases/03-api/{f}"));
        }
        let layout = locate(root).unwrap();
        let phase = &layout.phase_dirs[0];
        assert_eq!(phase.docs(DocKind::Context).len(), 1);
        assert_eq!(phase.docs(DocKind::Research).len(), 1);
        let plans: Vec<_> = phase
            .docs(DocKind::Plan)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(plans, vec!["03-01-PLAN.md", "03-02-PLAN.md"]);
        assert!(phase.latest_summary().unwrap().ends_with("03-02-SUMMARY.md"));
    }

    #[test]
    fn todos_listed_and_sorted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, ".planning/todos/pending/b-task.md");
        touch(root, ".planning/todos/pending/a-task.md");
        touch(root, ".planning/todos/pending/ignore.txt");
        touch(root, ".planning/todos/done/old.md");
        let layout = locate(root).unwrap();
        assert_eq!(layout.pending_todos.len(), 2);
        assert!(layout.pending_todos[0].ends_with("a-task.md"));
        assert_eq!(layout.done_todos.len(), 1);
    }

    #[test]
    fn phase_dir_matching() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, ".planning/phases/01-setup/01-CONTEXT.md");
        touch(root, ".planning/phases/03-api/03-CONTEXT.md");
        touch(root, ".planning/phases/02.1-hotfix/02.1-CONTEXT.md");
        let layout = locate(root).unwrap();

        assert_eq!(layout.phase_dir_for(Some("3"), 0).unwrap().slug, "api");
        assert_eq!(layout.phase_dir_for(Some("2.1"), 0).unwrap().slug, "hotfix");
        assert!(layout.phase_dir_for(Some("7"), 0).is_none());
        assert_eq!(layout.phase_dir_for(None, 1).unwrap().slug, "hotfix");
    }
}
