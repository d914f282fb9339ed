//! Shared types for logpane
//!
//! This crate contains the canonical record model and the severity scale
//! used by the converters and the live view.

mod record;
mod severity;

pub use record::{ArcRecord, Location, Property, Record, RecordBuilder};
pub use severity::{LEVEL_COUNT, Severity};

/// Default capacity of each per-severity buffer of an application
pub const DEFAULT_MAX_LOGS_PER_LEVEL: usize = 1000;

/// Separator of namespace path segments
pub const NAMESPACE_SPLITTER: char = '.';

/// Root namespace segment of records synthesized from Logcat lines
pub const NAMESPACE_LOGCAT: &str = "Logcat";

/// Namespace of records that carry none
pub const NAMESPACE_GLOBAL: &str = "Global (namespace)";

/// Application of records that carry none
pub const APPLICATION_GLOBAL: &str = "Global (application)";
