use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;

use crate::{APPLICATION_GLOBAL, NAMESPACE_GLOBAL, Severity};

/// Shared handle to an immutable record. Identity (pointer equality) is what
/// the live window deduplicates on.
pub type ArcRecord = Arc<Record>;

static SENTINEL: LazyLock<ArcRecord> = LazyLock::new(|| Arc::new(RecordBuilder::now().build()));

/// A name/value pair attached to a record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Source location of the logging call
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub class_name: Option<String>,
    pub file_name: Option<String>,
    pub method_name: Option<String>,
    pub line_number: Option<u32>,
}

impl Location {
    /// A location only counts as present when at least one field is set
    pub fn is_empty(&self) -> bool {
        self.class_name.is_none()
            && self.file_name.is_none()
            && self.method_name.is_none()
            && self.line_number.is_none()
    }
}

/// A canonical log record, produced once by a converter and only read
/// afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: DateTime<FixedOffset>,
    pub severity: Severity,
    pub message: String,
    pub exception: Option<String>,
    pub machine_name: Option<String>,
    /// Dot-separated logger path
    pub namespace: String,
    pub application: String,
    pub process: Option<String>,
    pub thread: Option<String>,
    pub context: Option<String>,
    pub location: Option<Location>,
    /// Sorted by name; duplicate names are kept
    pub properties: Vec<Property>,
}

impl Record {
    /// The shared placeholder a converter returns when it could not parse
    /// anything. Consumers detect it with [`Record::is_sentinel`].
    pub fn sentinel() -> ArcRecord {
        Arc::clone(&SENTINEL)
    }

    pub fn is_sentinel(record: &ArcRecord) -> bool {
        Arc::ptr_eq(record, &SENTINEL)
    }

    /// Look up the first property with the given name
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.severity, self.timestamp)?;
        writeln!(f, "Application: {}", self.application)?;
        writeln!(f, "Namespace: {}", self.namespace)?;
        if let Some(context) = self.context.as_deref().filter(|c| !c.is_empty()) {
            writeln!(f, "Context: {context}")?;
        }
        if let Some(thread) = self.thread.as_deref().filter(|t| !t.is_empty()) {
            writeln!(f, "Thread: {thread}")?;
        }
        writeln!(f, "Message: {}", self.message)?;
        if let Some(exception) = self.exception.as_deref().filter(|e| !e.is_empty()) {
            writeln!(f, "Exception: {exception}")?;
        }
        if let Some(host) = &self.machine_name {
            writeln!(f, "Host: {host}")?;
        }
        Ok(())
    }
}

/// Builds a [`Record`]; the only way converters assemble one.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            record: Record {
                timestamp,
                severity: Severity::NotSet,
                message: String::new(),
                exception: None,
                machine_name: None,
                namespace: NAMESPACE_GLOBAL.to_string(),
                application: APPLICATION_GLOBAL.to_string(),
                process: None,
                thread: None,
                context: None,
                location: None,
                properties: Vec::new(),
            },
        }
    }

    /// Start a record stamped with the local receive time
    pub fn now() -> Self {
        Self::new(Local::now().fixed_offset())
    }

    pub fn timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.record.severity = severity;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.record.message = message.into();
        self
    }

    pub fn exception(mut self, exception: Option<String>) -> Self {
        self.record.exception = exception;
        self
    }

    pub fn machine_name(mut self, machine_name: Option<String>) -> Self {
        self.record.machine_name = machine_name;
        self
    }

    /// Blank namespaces keep the global default
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        if !namespace.trim().is_empty() {
            self.record.namespace = namespace;
        }
        self
    }

    /// Blank application names keep the global default
    pub fn application(mut self, application: impl Into<String>) -> Self {
        let application = application.into();
        if !application.trim().is_empty() {
            self.record.application = application;
        }
        self
    }

    pub fn process(mut self, process: Option<String>) -> Self {
        self.record.process = process;
        self
    }

    pub fn thread(mut self, thread: Option<String>) -> Self {
        self.record.thread = thread;
        self
    }

    pub fn context(mut self, context: Option<String>) -> Self {
        self.record.context = context;
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.record.location = (!location.is_empty()).then_some(location);
        self
    }

    pub fn properties(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
        self.record.properties.extend(properties);
        self
    }

    pub fn build(mut self) -> Record {
        // stable sort: equal names keep their arrival order
        self.record.properties.sort_by(|a, b| a.name.cmp(&b.name));
        self.record
    }
}
