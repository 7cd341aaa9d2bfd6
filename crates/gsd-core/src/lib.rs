pub mod builder;
pub mod config;
pub mod error;
pub mod locator;
pub mod parse;
pub mod paths;
pub mod phase_doc;
pub mod project;
pub mod roadmap;
pub mod snapshot;
pub mod state_doc;
pub mod todo;
pub mod types;

pub use builder::SnapshotBuilder;
pub use config::DashboardConfig;
pub use error::{GsdError, Result};
pub use snapshot::ProjectSnapshot;
