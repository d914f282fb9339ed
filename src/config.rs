use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use logpane_convert::{ApplicationFormat, ConvertOptions, WireFormat};
use logpane_types::{DEFAULT_MAX_LOGS_PER_LEVEL, Severity};

pub const DEFAULT_PORT_CHAINSAW: u16 = 7071;
pub const DEFAULT_PORT_LOGCAT: u16 = 7081;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown severity '{0}' (expected TRACE, DEBUG, INFO, WARN, ERROR or FATAL)")]
    UnknownSeverity(String),

    #[error("tick interval must be positive")]
    ZeroTickInterval,

    #[error("max_logs_per_level must be positive")]
    ZeroMaxLogsPerLevel,
}

/// Contents of `logpane.toml`. Every field is optional.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_type: WireFormat,
    pub port_chainsaw: u16,
    pub port_logcat: u16,
    pub allow_anonymous_logs: bool,
    pub application_format: ApplicationFormat,
    pub initial_threshold: String,
    pub max_logs_per_level: usize,
    pub tick_interval_ms: u64,
    pub message_trace: bool,
    pub timing_trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_type: WireFormat::Chainsaw,
            port_chainsaw: DEFAULT_PORT_CHAINSAW,
            port_logcat: DEFAULT_PORT_LOGCAT,
            allow_anonymous_logs: true,
            application_format: ApplicationFormat::Split,
            initial_threshold: Severity::Trace.name().to_string(),
            max_logs_per_level: DEFAULT_MAX_LOGS_PER_LEVEL,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            message_trace: false,
            timing_trace: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.threshold()?;
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.max_logs_per_level == 0 {
            return Err(ConfigError::ZeroMaxLogsPerLevel);
        }
        Ok(())
    }

    /// Port of the selected wire format
    pub fn port(&self) -> u16 {
        match self.log_type {
            WireFormat::Chainsaw => self.port_chainsaw,
            WireFormat::Logcat => self.port_logcat,
        }
    }

    pub fn set_port(&mut self, port: u16) {
        match self.log_type {
            WireFormat::Chainsaw => self.port_chainsaw = port,
            WireFormat::Logcat => self.port_logcat = port,
        }
    }

    pub fn threshold(&self) -> Result<Severity, ConfigError> {
        Severity::from_name(&self.initial_threshold)
            .ok_or_else(|| ConfigError::UnknownSeverity(self.initial_threshold.clone()))
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            allow_anonymous_logs: self.allow_anonymous_logs,
            application_format: self.application_format,
        }
    }
}
