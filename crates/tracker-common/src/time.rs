//! Reference times reported by science file parsers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time value as handed back by a parser: either already a UTC instant or
/// the raw text found in the filename/content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScienceTime {
    Instant(DateTime<Utc>),
    Text(String),
}

impl ScienceTime {
    /// Resolve to a UTC instant, or None if the text is not a recognised format.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            ScienceTime::Instant(t) => Some(*t),
            ScienceTime::Text(s) => parse_time_text(s),
        }
    }
}

impl From<DateTime<Utc>> for ScienceTime {
    fn from(t: DateTime<Utc>) -> Self {
        ScienceTime::Instant(t)
    }
}

impl fmt::Display for ScienceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScienceTime::Instant(t) => write!(f, "{}", t.to_rfc3339()),
            ScienceTime::Text(s) => f.write_str(s),
        }
    }
}

/// Accepted text formats, tried in order after RFC 3339.
const TEXT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_time_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
