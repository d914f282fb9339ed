use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::trace;

use logpane_types::{ArcRecord, NAMESPACE_LOGCAT, NAMESPACE_SPLITTER, RecordBuilder, Severity};

use crate::{LogConverter, WireFormat};

static LOGCAT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(V|D|I|W|E|F|S)/([ -~]+)\(([0-9 ]+)\):([ -~]+)$").expect("logcat pattern is valid")
});

/// Converter for Android logcat lines such as
/// `I/ActivityManager(  585): Starting activity`.
///
/// The tag and pid become the namespace `Logcat.585.ActivityManager`.
/// Lines that do not match, or carry an empty message, are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogcatConverter;

impl LogcatConverter {
    fn parse_line(line: &str) -> Option<ArcRecord> {
        let captures = LOGCAT_REGEX.captures(line)?;

        let severity = captures[1]
            .chars()
            .next()
            .and_then(Severity::from_short_name)
            .unwrap_or_default();
        let tag = captures[2].trim();
        let pid = captures[3].trim();
        let message = captures[4].trim();

        if message.is_empty() {
            return None;
        }

        let namespace = format!("{NAMESPACE_LOGCAT}{NAMESPACE_SPLITTER}{pid}{NAMESPACE_SPLITTER}{tag}");
        let record = RecordBuilder::now()
            .severity(severity)
            .namespace(namespace)
            .message(message)
            .build();
        Some(Arc::new(record))
    }
}

impl LogConverter for LogcatConverter {
    fn convert(&self, text: &str) -> Vec<ArcRecord> {
        text.split(['\r', '\n'])
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let record = Self::parse_line(line);
                if record.is_none() {
                    trace!(line, "skipping non-logcat line");
                }
                record
            })
            .collect()
    }

    fn format(&self) -> WireFormat {
        WireFormat::Logcat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logpane_types::{APPLICATION_GLOBAL, Record};

    #[test]
    fn test_convert_single_line() {
        let records = LogcatConverter.convert("I/ActivityManager(  585): Starting activity");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(!Record::is_sentinel(record));
        assert_eq!(record.severity, Severity::Info);
        assert_eq!(record.namespace, "Logcat.585.ActivityManager");
        assert_eq!(record.message, "Starting activity");
        assert_eq!(record.application, APPLICATION_GLOBAL);
    }

    #[test]
    fn test_convert_mixed_line_endings() {
        let text = "V/Tag(1): one\r\nD/Tag(1): two\nE/Other( 22): three\rW/Tag(1): four\n\n";
        let records = LogcatConverter.convert(text);

        let levels: Vec<_> = records.iter().map(|r| r.severity).collect();
        assert_eq!(
            levels,
            vec![Severity::Trace, Severity::Debug, Severity::Error, Severity::Warn]
        );
        assert_eq!(records[2].namespace, "Logcat.22.Other");
    }

    #[test]
    fn test_skips_garbage_and_blank_messages() {
        let text = "garbage line\nI/Tag(12):    \nX/Tag(12): unknown level\nF/Crash(7): boom";
        let records = LogcatConverter.convert(text);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Fatal);
        assert_eq!(records[0].message, "boom");
    }

    #[test]
    fn test_silent_priority_has_no_level() {
        let records = LogcatConverter.convert("S/Quiet(3): hush");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::NotSet);
    }

    #[test]
    fn test_empty_input() {
        assert!(LogcatConverter.convert("").is_empty());
        assert!(LogcatConverter.convert("\r\n\r\n").is_empty());
    }
}
