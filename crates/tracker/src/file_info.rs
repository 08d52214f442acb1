//! Filesystem facts about a file being tracked.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use tracker_common::{TrackerError, TrackerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Canonical absolute path
    pub path: PathBuf,
    /// File name without its final extension
    pub filename: String,
    /// Lower-cased final extension with its leading dot; empty when absent
    pub extension: String,
    pub size: i64,
    pub modified: DateTime<Utc>,
}

impl FileInfo {
    /// Stat `path`. Fails with `FileNotFound` unless it is an existing regular file.
    pub async fn inspect(path: &Path) -> TrackerResult<Self> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(TrackerError::FileNotFound(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrackerError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let path = tokio::fs::canonicalize(path).await?;
        let filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            filename,
            extension: extension_of(&path),
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            modified: DateTime::<Utc>::from(metadata.modified()?),
            path,
        })
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Lower-cased final extension of `path`, with its leading dot.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
