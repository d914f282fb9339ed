use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset, Utc};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use regex::Regex;
use tracing::{error, trace};

use logpane_types::{ArcRecord, Location, Property, Record, RecordBuilder, Severity};

use crate::{ApplicationFormat, ConvertError, ConvertOptions, LogConverter, WireFormat};

pub(crate) const NS_URI_LOG4J: &str = "https://logging.apache.org/xml/ns";
const NS_URI_NLOG: &str = "https://nlog-project.org";

/// Prefixes that resolve even when the sender strips their declaration
const PREBOUND_PREFIXES: [(&[u8], &str); 2] = [(b"log4j", NS_URI_LOG4J), (b"nlog", NS_URI_NLOG)];

const EVENT_TAG: &str = "event";
const DATA_TAG: &str = "data";
const LOG4J_APP: &str = "log4japp";
const LOG4J_HOST: &str = "log4jmachinename";

static LOG4J_APP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<app>.+)\((?P<pid>[^)]+)\)\s*$").expect("log4japp pattern is valid")
});

/// Converter for log4j XML events as emitted to Chainsaw.
///
/// ```xml
/// <log4j:event logger="Example.Runner" level="INFO" timestamp="1439817232886" thread="1">
///   <log4j:message>Starting</log4j:message>
///   <log4j:properties>
///     <log4j:data name="log4japp" value="Server.exe(8428)" />
///   </log4j:properties>
/// </log4j:event>
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChainsawConverter {
    options: ConvertOptions,
}

impl ChainsawConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    fn try_convert(&self, text: &str) -> Result<Vec<Record>, ConvertError> {
        let elements = read_fragment(text)?;

        let records = self.read_events(&elements, true)?;
        if records.is_empty() && self.options.allow_anonymous_logs {
            // relays sometimes drop the namespace declarations
            trace!("no namespaced events found, reading without namespace check");
            return self.read_events(&elements, false);
        }
        Ok(records)
    }

    fn read_events(&self, elements: &[Element], strict: bool) -> Result<Vec<Record>, ConvertError> {
        elements
            .iter()
            .filter(|e| e.is(EVENT_TAG, strict))
            .map(|e| self.read_event(e, strict))
            .collect()
    }

    fn read_event(&self, event: &Element, strict: bool) -> Result<Record, ConvertError> {
        let mut builder = RecordBuilder::now();

        for (name, value) in &event.attributes {
            builder = match name.as_str() {
                "logger" => builder.namespace(value.as_str()),
                "level" => builder.severity(Severity::from_name(value).unwrap_or_default()),
                "timestamp" => builder.timestamp(parse_timestamp(value)?),
                "thread" => builder.thread(Some(value.clone())),
                _ => builder,
            };
        }

        let mut properties = Vec::new();
        for child in &event.children {
            builder = match child.name.as_str() {
                "message" => builder.message(child.text.as_str()),
                "throwable" => builder.exception(non_empty(&child.text)),
                "NDC" => builder.context(non_empty(&child.text)),
                "MDC" | "properties" => {
                    properties.extend(read_data(child, strict));
                    builder
                }
                "locationInfo" => builder.location(read_location(child)),
                _ => builder,
            };
        }

        if let Some(raw) = find_property(&properties, LOG4J_APP) {
            let (application, process) = split_application(raw, self.options.application_format);
            builder = builder.application(application).process(process);
        }
        builder = builder.machine_name(find_property(&properties, LOG4J_HOST).map(str::to_string));
        properties.retain(|p| p.name != LOG4J_APP && p.name != LOG4J_HOST);

        Ok(builder.properties(properties).build())
    }
}

impl LogConverter for ChainsawConverter {
    fn convert(&self, text: &str) -> Vec<ArcRecord> {
        match self.try_convert(text) {
            Ok(records) => records.into_iter().map(Arc::new).collect(),
            Err(e) => {
                error!(error = %e, "could not read log4j data");
                vec![Record::sentinel()]
            }
        }
    }

    fn format(&self) -> WireFormat {
        WireFormat::Chainsaw
    }
}

/// Minimal element tree of one payload
#[derive(Debug, Default)]
struct Element {
    /// Resolved namespace URI
    namespace: Option<String>,
    /// Local name, prefix stripped
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn is(&self, name: &str, strict: bool) -> bool {
        self.name == name && (!strict || self.namespace.as_deref() == Some(NS_URI_LOG4J))
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Read a sequence of sibling elements (an XML fragment, no single root)
fn read_fragment(text: &str) -> Result<Vec<Element>, ConvertError> {
    let mut reader = NsReader::from_str(text);
    let mut roots = Vec::new();
    let mut open: Vec<Element> = Vec::new();

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(start)) => open.push(element(ns, &start)?),
            (ns, Event::Empty(start)) => {
                let element = element(ns, &start)?;
                attach(&mut open, &mut roots, element);
            }
            (_, Event::End(_)) => {
                if let Some(element) = open.pop() {
                    attach(&mut open, &mut roots, element);
                }
            }
            (_, Event::Text(text)) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&text.unescape()?);
                }
            }
            (_, Event::CData(data)) => {
                if let Some(parent) = open.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    match open.pop() {
        Some(unclosed) => Err(ConvertError::Unterminated(unclosed.name)),
        None => Ok(roots),
    }
}

fn attach(open: &mut [Element], roots: &mut Vec<Element>, element: Element) {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

fn element(ns: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Element, ConvertError> {
    let namespace = match ns {
        ResolveResult::Bound(uri) => Some(String::from_utf8_lossy(uri.as_ref()).into_owned()),
        ResolveResult::Unknown(prefix) => PREBOUND_PREFIXES
            .iter()
            .find(|(p, _)| *p == prefix.as_slice())
            .map(|(_, uri)| uri.to_string()),
        ResolveResult::Unbound => None,
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let name = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((name, value));
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..Default::default()
    })
}

fn read_data(container: &Element, strict: bool) -> Vec<Property> {
    container
        .children
        .iter()
        .filter(|e| e.is(DATA_TAG, strict))
        .filter_map(|e| {
            let name = e.attribute("name").filter(|n| !n.is_empty())?;
            Some(Property::new(name, e.attribute("value").unwrap_or_default()))
        })
        .collect()
}

fn read_location(element: &Element) -> Location {
    Location {
        class_name: element.attribute("class").map(str::to_string),
        file_name: element.attribute("file").map(str::to_string),
        method_name: element.attribute("method").map(str::to_string),
        line_number: element.attribute("line").and_then(|l| l.trim().parse().ok()),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ConvertError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|ts| ts.fixed_offset())
        .ok_or_else(|| ConvertError::InvalidTimestamp(value.to_string()))
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.as_str())
}

/// Split a `log4japp` value like `Server.exe(8428)` into application and
/// process id
fn split_application(raw: &str, format: ApplicationFormat) -> (String, Option<String>) {
    let captures = LOG4J_APP_REGEX.captures(raw);
    let process = captures
        .as_ref()
        .and_then(|c| c.name("pid"))
        .map(|m| m.as_str().trim().to_string());

    let application = match (format, captures.as_ref().and_then(|c| c.name("app"))) {
        (ApplicationFormat::Split, Some(app)) => app.as_str().trim().to_string(),
        _ => raw.trim().to_string(),
    };

    (application, process)
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
