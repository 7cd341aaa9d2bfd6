use crate::parse::{Note, Parsed};
use crate::types::TodoStatus;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A captured todo file under `todos/pending/` or `todos/done/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    /// File stem; unique within its directory.
    pub id: String,
    pub text: String,
    pub status: TodoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
}

/// What the file content says about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoFront {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
}

impl Todo {
    /// Combine the file stem with its parsed content. The title falls back to
    /// the prettified stem.
    pub fn from_file(stem: &str, front: TodoFront, status: TodoStatus) -> Self {
        let text = front
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| prettify_stem(stem));
        Self {
            id: stem.to_string(),
            text,
            status,
            area: front.area.filter(|a| !a.trim().is_empty()),
        }
    }
}

/// Sort for display: alphabetical by text, then by id.
pub fn sort_todos(todos: &mut [Todo]) {
    todos.sort_by(|a, b| {
        a.text
            .to_lowercase()
            .cmp(&b.text.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

static DATE_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn date_prefix_re() -> &'static Regex {
    DATE_PREFIX_RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}-").unwrap())
}

/// `2026-02-07-settings-detail-page-refactor` → `Settings detail page refactor`.
pub fn prettify_stem(stem: &str) -> String {
    let name = date_prefix_re().replace(stem, "").replace(['-', '_'], " ");
    let name = name.trim().to_lowercase();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => stem.to_string(),
    }
}

/// YAML between a leading `---` line and the next `---` line.
fn extract_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))?;
    if let Some(body) = rest.strip_prefix("---") {
        return Some(("", body));
    }
    let end = rest.find("\n---")?;
    let body = &rest[end + 4..];
    Some((&rest[..end], body))
}

/// Parse a todo file: front matter `title`/`area`, else the first `# ` heading.
pub fn parse(text: &str) -> Parsed<TodoFront> {
    let mut notes = Vec::new();
    let mut front = TodoFront::default();
    let mut body = text;

    if let Some((yaml, rest)) = extract_front_matter(text) {
        body = rest;
        if !yaml.trim().is_empty() {
            match serde_yaml::from_str::<TodoFront>(yaml) {
                Ok(parsed) => front = parsed,
                Err(e) => notes.push(Note::at(1, format!("malformed front matter: {e}"))),
            }
        }
    }

    if front.title.is_none() {
        front.title = body
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    Parsed::new(front, notes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
