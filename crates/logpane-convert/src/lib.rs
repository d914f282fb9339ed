//! Wire-format converters for logpane
//!
//! Each converter turns one decoded payload into the records it carries.
//! Converters are stateless and never fail: when a payload cannot be read
//! they return a single [`Record::sentinel`] which callers must drop.

mod chainsaw;
mod logcat;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chainsaw::ChainsawConverter;
pub use logcat::LogcatConverter;

// Re-export types used in our public API
pub use logpane_types::{ArcRecord, Record};

/// Converts a raw text payload into records
pub trait LogConverter: Send + Sync {
    /// Total function: on failure returns `[Record::sentinel()]`
    fn convert(&self, text: &str) -> Vec<ArcRecord>;

    fn format(&self) -> WireFormat;
}

/// Supported wire formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// log4j XML events as sent to Chainsaw
    #[default]
    Chainsaw,
    /// Android logcat lines
    Logcat,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chainsaw => "chainsaw",
            Self::Logcat => "logcat",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chainsaw" | "log4j" => Ok(Self::Chainsaw),
            "logcat" => Ok(Self::Logcat),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown wire format: {0}")]
pub struct UnknownFormat(pub String);

/// How the `log4japp` property maps onto application and process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationFormat {
    /// `App.exe(1234)` becomes application `App.exe`, process `1234`
    #[default]
    Split,
    /// The trimmed raw value is always the application
    Raw,
}

/// Converter settings taken from configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Re-read Chainsaw payloads without namespace checks when the strict
    /// pass finds no events
    pub allow_anonymous_logs: bool,
    pub application_format: ApplicationFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            allow_anonymous_logs: true,
            application_format: ApplicationFormat::default(),
        }
    }
}

/// Internal failure while reading a payload. Never leaves a converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed XML escape: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unterminated element <{0}>")]
    Unterminated(String),
}

/// Create the converter for a wire format
pub fn converter_for(format: WireFormat, options: ConvertOptions) -> Arc<dyn LogConverter> {
    match format {
        WireFormat::Chainsaw => Arc::new(ChainsawConverter::new(options)),
        WireFormat::Logcat => Arc::new(LogcatConverter),
    }
}
