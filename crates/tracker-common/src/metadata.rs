//! Science metadata extracted from a file by a parser.

use serde::{Deserialize, Serialize};

use crate::time::ScienceTime;

/// Identifying metadata for one science file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScienceFileMetadata {
    /// Instrument short name (e.g. "eea")
    pub instrument: String,
    /// Operating mode; empty when the naming convention carries none
    #[serde(default)]
    pub mode: String,
    /// File level short name (e.g. "l0", "ql")
    pub level: String,
    /// Version string as it appears in the filename
    pub version: String,
    /// Reference time of the observation
    pub time: Option<ScienceTime>,
}
