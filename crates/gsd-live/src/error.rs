use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("cannot watch {}: directory does not exist", .0.display())]
    WatchDirMissing(PathBuf),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, LiveError>;
