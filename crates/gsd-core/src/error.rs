use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GsdError {
    #[error("not a GSD project: {} has no .planning/ directory", root.display())]
    NotAGsdProject { root: PathBuf },

    #[error("unknown document kind: {0}")]
    UnknownDocKind(String),

    #[error("invalid dashboard config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GsdError {
    /// True for the one condition that stops snapshots from being built at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GsdError::NotAGsdProject { .. })
    }
}

pub type Result<T> = std::result::Result<T, GsdError>;
