pub mod engine;
pub mod error;
pub mod watcher;

pub use engine::{EngineOptions, EngineStatus, RefreshEngine, RefreshHandle, SnapshotSource};
pub use error::{LiveError, Result};
pub use watcher::{ChangeWatcher, RefreshSignal};
