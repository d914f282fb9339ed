//! Live view for logpane
//!
//! This crate turns a stream of received records into the ordered, filtered
//! set of visible records: per-application buffers, namespace trees, search,
//! and the batching coordinator that ties them together.

mod aggregator;
mod coordinator;
mod driver;
mod namespace;
mod search;
mod window;

use thiserror::Error;

pub use aggregator::{Aggregator, ViewSettings};
pub use coordinator::{ApplicationSummary, Coordinator};
pub use driver::{DEFAULT_TICK_INTERVAL, ViewCommand, ViewHandle, ViewLoop, view_channel};
pub use namespace::{LevelCounts, NamespaceForest, NamespaceNode};
pub use search::{SearchCriteria, SearchFilter};
pub use window::{LiveWindow, WindowChange};

// Re-export types used in our public API
pub use logpane_types::{ArcRecord, Record, Severity};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown application: {0}")]
    UnknownApplication(String),

    #[error("unknown namespace '{namespace}' in application {application}")]
    UnknownNamespace { application: String, namespace: String },

    #[error("view loop has shut down")]
    Closed,
}
