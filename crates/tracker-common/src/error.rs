//! Error types for metatracker operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using TrackerError.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Primary error type for tracking operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    // === Input Errors ===
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid file type '{extension}' for {}", .path.display())]
    InvalidFileType { extension: String, path: PathBuf },

    #[error("Invalid file level '{level}' for {filename}")]
    InvalidFileLevel { level: String, filename: String },

    #[error("Invalid instrument '{instrument}' for {filename}")]
    InvalidInstrument { instrument: String, filename: String },

    #[error("No instrument configuration matches {instruments:?}")]
    ConfigurationNotFound { instruments: Vec<String> },

    #[error("Invalid timestamp {value:?} for {filename}")]
    InvalidTimestamp {
        filename: String,
        value: Option<String>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to parse {}: {source}", .path.display())]
    Parser {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    // === Storage Errors ===
    #[error("Transient storage conflict: {0}")]
    TransientStoreConflict(#[source] sqlx::Error),

    #[error("Database connection is not valid: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    // === Infrastructure Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::TransientStoreConflict(_))
    }

    /// Whether the error rejects the file itself rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidFileType { .. }
                | TrackerError::InvalidFileLevel { .. }
                | TrackerError::InvalidInstrument { .. }
                | TrackerError::ConfigurationNotFound { .. }
                | TrackerError::InvalidTimestamp { .. }
        )
    }

    /// Stable code for logs and batch summaries.
    pub fn error_code(&self) -> &'static str {
        match self {
            TrackerError::FileNotFound(_) => "file_not_found",
            TrackerError::InvalidFileType { .. } => "invalid_file_type",
            TrackerError::InvalidFileLevel { .. } => "invalid_file_level",
            TrackerError::InvalidInstrument { .. } => "invalid_instrument",
            TrackerError::ConfigurationNotFound { .. } => "configuration_not_found",
            TrackerError::InvalidTimestamp { .. } => "invalid_timestamp",
            TrackerError::InvalidArgument(_) => "invalid_argument",
            TrackerError::Parser { .. } => "parser_error",
            TrackerError::TransientStoreConflict(_) => "transient_store_conflict",
            TrackerError::Connection(_) => "connection_error",
            TrackerError::Database(_) => "database_error",
            TrackerError::Config(_) => "config_error",
            TrackerError::Io(_) => "io_error",
        }
    }
}

/// SQLite primary and extended result codes for busy/locked conditions.
const TRANSIENT_SQLITE_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Returns true for lock contention and pool exhaustion.
pub fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                if TRANSIENT_SQLITE_CODES.contains(&&*code) {
                    return true;
                }
            }
            let msg = db_err.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient_sqlx(&err) {
            TrackerError::TransientStoreConflict(err)
        } else {
            TrackerError::Database(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_not_transient() {
        let err = TrackerError::InvalidFileType {
            extension: ".bop".to_string(),
            path: PathBuf::from("/tmp/a.bop"),
        };
        assert!(err.is_validation());
        assert!(!err.is_transient());
        assert_eq!(err.error_code(), "invalid_file_type");
        assert!(err.to_string().contains(".bop"));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: TrackerError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_row_not_found_is_not_transient() {
        let err: TrackerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TrackerError::Database(_)));
        assert_eq!(err.error_code(), "database_error");
    }

    #[test]
    fn test_configuration_not_found_lists_instruments() {
        let err = TrackerError::ConfigurationNotFound {
            instruments: vec!["eea".to_string(), "nemisis".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("eea"));
        assert!(msg.contains("nemisis"));
    }
}
