//! Metadata extraction from science filenames.
//!
//! Two naming conventions are recognised:
//!
//! - raw / level 0: `hermes_MAG_l0_2022259-030002_v01.bin`
//!   (`<mission>_<CODE>_<level>_<YYYYJJJ-HHMMSS>_v<NN>.<ext>`)
//! - higher levels: `hermes_eea_normal_l1_20220916T030002_v1.0.0.cdf`
//!   (`<mission>_<inst>_[<mode>_]<level>_<YYYYMMDDTHHMMSS>_v<X.Y.Z>.<ext>`)

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use tracker_common::{MissionConfig, ScienceFileMetadata, ScienceTime};

use crate::parser::ScienceFileParser;

/// Parser for the mission's filename convention.
#[derive(Debug, Clone)]
pub struct FilenameParser {
    mission: String,
    /// Upper-case filename codes to instrument short names
    instrument_codes: BTreeMap<String, String>,
}

impl FilenameParser {
    pub fn new(mission: impl Into<String>, instrument_codes: BTreeMap<String, String>) -> Self {
        Self {
            mission: mission.into().to_lowercase(),
            instrument_codes: instrument_codes
                .into_iter()
                .map(|(code, name)| (code.to_uppercase(), name))
                .collect(),
        }
    }

    pub fn from_config(config: &MissionConfig) -> Self {
        Self::new(&config.mission_name, config.instrument_codes.clone())
    }

    /// Parse a bare filename, extension included.
    pub fn parse_filename(&self, filename: &str) -> anyhow::Result<ScienceFileMetadata> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("'{}' has no file stem", filename))?;

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 5 || parts.len() > 6 {
            bail!("'{}' does not follow the {} naming convention", filename, self.mission);
        }
        if !parts[0].eq_ignore_ascii_case(&self.mission) {
            bail!("'{}' does not belong to mission '{}'", filename, self.mission);
        }

        let time_str = parts[parts.len() - 2];
        let version = parts[parts.len() - 1]
            .strip_prefix('v')
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("'{}' has no version field", filename))?;
        let level = parts[parts.len() - 3].to_lowercase();

        if let Some(time) = parse_ordinal_timestamp(time_str) {
            // Level 0 names carry an instrument code and never a mode
            if parts.len() != 5 {
                bail!("'{}' has an unexpected field count for a raw file", filename);
            }
            let instrument = self.instrument_for_code(parts[1]);
            return Ok(ScienceFileMetadata {
                instrument,
                mode: String::new(),
                level,
                version: version.to_string(),
                time: Some(ScienceTime::Instant(time)),
            });
        }

        let time = parse_compact_timestamp(time_str)
            .with_context(|| format!("'{}' has an unrecognised time field '{}'", filename, time_str))?;
        let mode = if parts.len() == 6 {
            parts[2].to_lowercase()
        } else {
            String::new()
        };

        Ok(ScienceFileMetadata {
            instrument: self.instrument_for_code(parts[1]),
            mode,
            level,
            version: version.to_string(),
            time: Some(ScienceTime::Instant(time)),
        })
    }

    /// Map a filename code to an instrument short name; unknown codes are
    /// returned lower-cased for the validator to judge.
    fn instrument_for_code(&self, code: &str) -> String {
        self.instrument_codes
            .get(&code.to_uppercase())
            .cloned()
            .unwrap_or_else(|| code.to_lowercase())
    }
}

impl ScienceFileParser for FilenameParser {
    fn parse(&self, path: &Path) -> anyhow::Result<ScienceFileMetadata> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("{} has no UTF-8 file name", path.display()))?;
        self.parse_filename(filename)
    }
}

/// `YYYYJJJ-HHMMSS` (day of year).
fn parse_ordinal_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 14 || s.as_bytes().get(7) != Some(&b'-') {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y%j-%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// `YYYYMMDDTHHMMSS`.
fn parse_compact_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")?;
    Ok(Utc.from_utc_datetime(&naive))
}
