use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Rank used in place of `NotSet` when computing threshold bands, so that
/// "no threshold" sits above every concrete level.
const INVALID_RANK: i32 = 99;

/// Number of concrete severities (`Trace` through `Fatal`).
pub const LEVEL_COUNT: usize = 6;

/// Log severity level, ordered by rank.
///
/// `NotSet` ranks below every concrete level and is never returned by the
/// lookup functions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    #[serde(rename = "NOT_SET")]
    NotSet,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// The concrete levels in ascending rank.
    pub const ALL: [Severity; LEVEL_COUNT] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    pub fn id(self) -> i32 {
        match self {
            Self::NotSet => -1,
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warn => 3,
            Self::Error => 4,
            Self::Fatal => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NotSet => "[not set]",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// One-letter code, matching the Logcat priority letters
    pub fn short_name(self) -> char {
        match self {
            Self::NotSet => '-',
            Self::Trace => 'V',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
            Self::Fatal => 'F',
        }
    }

    /// Case-insensitive lookup over the concrete levels
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(name))
    }

    pub fn from_short_name(short_name: char) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.short_name() == short_name)
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.id() == id)
    }

    /// The concrete levels in ascending rank
    pub fn all() -> impl Iterator<Item = Severity> {
        Self::ALL.into_iter()
    }

    /// Slot of a concrete level in per-level arrays, `None` for `NotSet`
    pub fn index(self) -> Option<usize> {
        match self {
            Self::NotSet => None,
            level => Some(level.id() as usize),
        }
    }

    pub fn is_concrete(self) -> bool {
        self != Self::NotSet
    }

    /// Rank of this level when used as a minimum-severity threshold.
    /// An unset threshold shows nothing, so it ranks above every level.
    pub fn threshold_rank(self) -> i32 {
        match self {
            Self::NotSet => INVALID_RANK,
            level => level.id(),
        }
    }

    /// The half-open band of levels whose visibility changes when a threshold
    /// moves from `from` to `to` (or back).
    ///
    /// Lowering the bar from `Warn` to `Debug` yields `[Debug, Info]`; raising
    /// it from `Debug` to `Warn` yields the same band.
    pub fn levels_between(from: Option<Severity>, to: Option<Severity>) -> Vec<Severity> {
        let (Some(from), Some(to)) = (from, to) else {
            return Vec::new();
        };
        if from == to {
            return Vec::new();
        }

        let (from, to) = (from.threshold_rank(), to.threshold_rank());
        let (lower, upper) = if from < to { (from, to) } else { (to, from) };

        Self::all()
            .filter(|l| l.id() >= lower && l.id() < upper)
            .collect()
    }

    /// Total order over optional levels where an absent level is below
    /// every present one.
    pub fn cmp_optional(a: Option<Severity>, b: Option<Severity>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.id().cmp(&b.id()),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
