//! Shared test utilities for the metatracker workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Seeded in-memory and on-disk catalogs
//! - Stub metadata parsers
//! - Science file generators (names and files on disk)
//! - Paths to the sample mission configurations
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_error_code, seeded_memory_catalog, stub_parser};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Assert that a `TrackerResult` failed with the given stable error code.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_error_code;
///
/// let result = tracker.track(&path, &request).await;
/// assert_error_code!(result, "invalid_file_type");
/// ```
#[macro_export]
macro_rules! assert_error_code {
    ($result:expr, $code:expr) => {{
        match $result {
            Ok(value) => panic!(
                "expected error with code `{}`, got Ok({:?})",
                $code, value
            ),
            Err(err) => assert_eq!(
                err.error_code(),
                $code,
                "unexpected error: {}",
                err
            ),
        }
    }};
}

#[cfg(test)]
mod tests {
    use tracker_common::{TrackerError, TrackerResult};

    #[test]
    fn test_assert_error_code_passes() {
        let result: TrackerResult<()> = Err(TrackerError::InvalidArgument("x".to_string()));
        assert_error_code!(result, "invalid_argument");
    }

    #[test]
    #[should_panic(expected = "expected error with code")]
    fn test_assert_error_code_fails_on_ok() {
        let result: TrackerResult<i32> = Ok(1);
        assert_error_code!(result, "invalid_argument");
    }
}
