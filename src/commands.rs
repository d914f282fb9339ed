use thiserror::Error;

use logpane_types::Severity;
use logpane_view::{SearchCriteria, ViewCommand};

/// A command that can be typed on stdin
pub struct Command {
    pub usage: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
    Command { usage: "threshold <LEVEL> <app>", description: "Minimum level shown for an application" },
    Command { usage: "default-threshold <LEVEL>", description: "Minimum level for applications seen later" },
    Command { usage: "on <app> | off <app>", description: "Show or hide an application" },
    Command { usage: "show <ns> <app> | hide <ns> <app>", description: "Toggle a namespace subtree ('.' for all)" },
    Command { usage: "max <n>", description: "Records kept per level and application" },
    Command { usage: "search [text] | search! [text]", description: "Filter by text, '!' inverts, no text clears" },
    Command { usage: "pause | resume", description: "Stop or restart accepting records" },
    Command { usage: "clear | clear-all | unselect-all", description: "Drop records, drop everything, hide all" },
    Command { usage: "apps", description: "List applications" },
    Command { usage: "help", description: "Show this list" },
];

/// A parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    View(ViewCommand),
    ListApplications,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("unknown level '{0}'")]
    UnknownSeverity(String),

    #[error("not a number: '{0}'")]
    InvalidNumber(String),

    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

fn severity(word: &str) -> Result<Severity, CommandError> {
    Severity::from_name(word).ok_or_else(|| CommandError::UnknownSeverity(word.to_string()))
}

/// Split off the first word; the remainder is trimmed
fn word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if value.is_empty() {
        Err(CommandError::Missing(what))
    } else {
        Ok(value)
    }
}

/// Parse one line. Application names run to the end of the line so they
/// may contain spaces. Returns `None` for blank lines.
pub fn parse(line: &str) -> Result<Option<Input>, CommandError> {
    let (name, rest) = word(line);
    let command = match name {
        "" => return Ok(None),
        "help" => return Ok(Some(Input::Help)),
        "apps" => return Ok(Some(Input::ListApplications)),
        "threshold" => {
            let (level, application) = word(rest);
            ViewCommand::SetThreshold {
                threshold: severity(required(level, "level")?)?,
                application: required(application, "application")?.to_string(),
            }
        }
        "default-threshold" => ViewCommand::SetDefaultThreshold(severity(required(rest, "level")?)?),
        "on" | "off" => ViewCommand::SetActive {
            application: required(rest, "application")?.to_string(),
            active: name == "on",
        },
        "show" | "hide" => {
            let (path, application) = word(rest);
            let path = required(path, "namespace")?;
            ViewCommand::SetNamespaceSelected {
                application: required(application, "application")?.to_string(),
                path: if path == "." { String::new() } else { path.to_string() },
                selected: name == "show",
            }
        }
        "max" => {
            let n = required(rest, "count")?;
            let max: usize = n
                .parse()
                .map_err(|_| CommandError::InvalidNumber(n.to_string()))?;
            if max == 0 {
                return Err(CommandError::NotPositive("count"));
            }
            ViewCommand::SetMaxPerLevel(max)
        }
        "search" | "search!" => ViewCommand::SetSearch(SearchCriteria {
            text: (!rest.is_empty()).then(|| rest.to_string()),
            inverted: name == "search!",
        }),
        "pause" => ViewCommand::SetReceiving(false),
        "resume" => ViewCommand::SetReceiving(true),
        "clear" => ViewCommand::ClearLogs,
        "clear-all" => ViewCommand::ClearAll,
        "unselect-all" => ViewCommand::UnselectAll,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(Input::View(command)))
}
