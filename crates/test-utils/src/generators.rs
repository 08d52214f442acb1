//! Science file generators for tests.
//!
//! Produce filenames in the mission naming convention and write placeholder
//! files to disk so the tracker has something real to stat.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Raw (level 0) filename: `<mission>_<CODE>_l0_<YYYYJJJ-HHMMSS>_v<NN>.bin`.
pub fn raw_filename(mission: &str, code: &str, time: DateTime<Utc>, version: u32) -> String {
    format!(
        "{}_{}_l0_{:04}{:03}-{:02}{:02}{:02}_v{:02}.bin",
        mission,
        code,
        time.year(),
        time.ordinal(),
        time.hour(),
        time.minute(),
        time.second(),
        version
    )
}

/// Higher-level filename: `<mission>_<inst>_[<mode>_]<level>_<YYYYMMDDTHHMMSS>_v<ver>.cdf`.
pub fn processed_filename(
    mission: &str,
    instrument: &str,
    mode: Option<&str>,
    level: &str,
    time: DateTime<Utc>,
    version: &str,
) -> String {
    let mode = mode.map(|m| format!("{}_", m)).unwrap_or_default();
    format!(
        "{}_{}_{}{}_{}_v{}.cdf",
        mission,
        instrument,
        mode,
        level,
        time.format("%Y%m%dT%H%M%S"),
        version
    )
}

/// Write `size` bytes of patterned content to `dir/name` and return the path.
pub fn write_science_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, content).expect("Failed to write test science file");
    path
}
