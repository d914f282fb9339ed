use regex::{Regex, RegexBuilder};
use tracing::warn;

use logpane_types::Record;

/// Free-text search settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Text to look for; `None` or empty matches everything
    pub text: Option<String>,

    /// Keep the records that do *not* contain the text
    pub inverted: bool,
}

impl SearchCriteria {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inverted: false,
        }
    }

    /// Invert the match
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
    }
}

/// Upper bound on the compiled size of a search pattern
const MAX_PATTERN_SIZE: usize = 1 << 20;

#[derive(Clone, Debug)]
enum Matcher {
    Any,
    Text(Regex),
    Broken(String),
}

/// Compiled form of [`SearchCriteria`]: a case-insensitive substring test
/// over application, namespace, message and exception.
#[derive(Clone, Debug)]
pub struct SearchFilter {
    criteria: SearchCriteria,
    matcher: Matcher,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self::new(SearchCriteria::default())
    }
}

impl SearchFilter {
    pub fn new(criteria: SearchCriteria) -> Self {
        let matcher = match criteria.text.as_deref() {
            None | Some("") => Matcher::Any,
            Some(text) => match RegexBuilder::new(&regex::escape(text))
                .case_insensitive(true)
                .size_limit(MAX_PATTERN_SIZE)
                .build()
            {
                Ok(regex) => Matcher::Text(regex),
                Err(e) => {
                    warn!(error = %e, "search filter unusable, hiding every record");
                    Matcher::Broken(e.to_string())
                }
            },
        };
        Self { criteria, matcher }
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    /// Why the text could not be compiled, if it could not
    pub fn error(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Broken(error) => Some(error),
            _ => None,
        }
    }

    /// Test a record. A filter that failed to compile matches nothing.
    pub fn matches(&self, record: &Record) -> bool {
        let regex = match &self.matcher {
            Matcher::Any => return true,
            Matcher::Text(regex) => regex,
            Matcher::Broken(_) => return false,
        };

        let found = regex.is_match(&record.application)
            || regex.is_match(&record.namespace)
            || regex.is_match(&record.message)
            || record.exception.as_deref().is_some_and(|e| regex.is_match(e));

        found != self.criteria.inverted
    }
}
