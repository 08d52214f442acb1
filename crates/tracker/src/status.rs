//! Processing status payloads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tracker_common::{TrackerError, TrackerResult};

/// A processing-status record to attach to a science file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub processing_status: String,
    #[serde(default)]
    pub processing_status_message: Option<String>,
    /// Seconds spent processing
    #[serde(default)]
    pub processing_time_length: Option<i64>,
    /// Science files this one was produced from
    #[serde(default)]
    pub origin_file_ids: Option<Vec<i64>>,
}

impl StatusUpdate {
    pub fn new(processing_status: impl Into<String>) -> Self {
        Self {
            processing_status: processing_status.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.processing_status_message = Some(message.into());
        self
    }

    pub fn with_processing_time(mut self, seconds: i64) -> Self {
        self.processing_time_length = Some(seconds);
        self
    }

    pub fn with_origins(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.origin_file_ids = Some(ids.into_iter().collect());
        self
    }

    /// Shape checks that need no database: non-empty status, non-negative
    /// processing time, positive origin ids. Returns the de-duplicated origins.
    pub fn validate(&self) -> TrackerResult<BTreeSet<i64>> {
        if self.processing_status.trim().is_empty() {
            return Err(TrackerError::InvalidArgument(
                "processing_status cannot be empty".to_string(),
            ));
        }
        if let Some(seconds) = self.processing_time_length {
            if seconds < 0 {
                return Err(TrackerError::InvalidArgument(format!(
                    "processing_time_length must be non-negative, got {}",
                    seconds
                )));
            }
        }

        let origins: BTreeSet<i64> = self.origin_file_ids.iter().flatten().copied().collect();
        if let Some(bad) = origins.iter().find(|id| **id <= 0) {
            return Err(TrackerError::InvalidArgument(format!(
                "origin file id {} is not a valid science file id",
                bad
            )));
        }
        Ok(origins)
    }
}

/// Parse origin file ids given as text (e.g. from the command line).
///
/// Each item may itself be a comma-separated list.
pub fn parse_origin_ids<S: AsRef<str>>(values: &[S]) -> TrackerResult<Vec<i64>> {
    let mut ids = Vec::new();
    for value in values {
        for item in value.as_ref().split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = item.parse::<i64>().map_err(|_| {
                TrackerError::InvalidArgument(format!("origin file id '{}' is not an integer", item))
            })?;
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_ids() {
        assert_eq!(parse_origin_ids(&["1", "2,3", " 4 "]).unwrap(), vec![1, 2, 3, 4]);
        assert!(parse_origin_ids::<&str>(&[]).unwrap().is_empty());
        assert!(matches!(
            parse_origin_ids(&["7", "abc"]),
            Err(TrackerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_dedups_origins() {
        let update = StatusUpdate::new("processed").with_origins([3, 1, 3]);
        assert_eq!(update.validate().unwrap(), BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_validate_rejects_bad_payloads() {
        assert!(StatusUpdate::new("").validate().is_err());
        assert!(StatusUpdate::new("ok").with_origins([0]).validate().is_err());
        assert!(StatusUpdate::new("ok").with_processing_time(-1).validate().is_err());
    }
}
