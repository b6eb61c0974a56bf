use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;

/// A dotted format-version string, compared numerically segment by segment.
///
/// The format history mixes spellings like `"5"`, `"5.1"` and `"5.1.1"`;
/// missing segments compare as zero, so `"5"` and `"5.0"` denote the same
/// generation. Plain string ordering would misplace a two-digit segment
/// (`"3.10"` before `"3.2"`), so comparison always goes through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatVersion {
    segments: Vec<u32>,
}

impl FormatVersion {
    /// Parses a dotted version string. Returns `None` for anything that is
    /// not a non-empty sequence of `.`-separated decimal segments.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let mut segments = raw
            .split('.')
            .map(|segment| segment.parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()?;
        // Normalize so that "5" == "5.0" == "5.0.0".
        while segments.last() == Some(&0) && segments.len() > 1 {
            segments.pop();
        }
        Some(Self { segments })
    }

    fn segment(&self, index: usize) -> u32 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl Ord for FormatVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for FormatVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().join("."))
    }
}

/// Whether two version strings denote the same format generation.
///
/// Falls back to literal equality when either side does not parse, so that a
/// ladder keyed on an irregular historical spelling still matches it.
pub fn same_version(a: &str, b: &str) -> bool {
    match (FormatVersion::parse(a), FormatVersion::parse(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Whether `version` is strictly older than `reference`. An unparseable
/// version is never considered older.
pub fn older_than(version: &str, reference: &str) -> bool {
    match (FormatVersion::parse(version), FormatVersion::parse(reference)) {
        (Some(version), Some(reference)) => version < reference,
        _ => false,
    }
}
