//! Science file tracking library.
//!
//! Records science data files in the mission catalog: validates them against
//! the reference tables, resolves their instrument configuration, and upserts
//! product, file and processing-status rows.
//!
//! # Architecture
//!
//! - `Validator` / `Resolver`: read-only checks against the reference catalog
//! - `MetaTracker`: the engine; one transaction per upsert step, each retried
//!   on transient store conflicts
//! - `ScienceFileParser`: the injected metadata parser; `FilenameParser`
//!   implements the mission naming convention

pub mod engine;
pub mod file_info;
pub mod metadata;
pub mod parser;
pub mod resolver;
pub mod retry;
pub mod status;
pub mod validator;

// Re-exports
pub use engine::{FileConflictPolicy, MetaTracker, TrackRequest, TrackedFile, TrackerOptions};
pub use file_info::{extension_of, FileInfo};
pub use metadata::FilenameParser;
pub use parser::ScienceFileParser;
pub use resolver::Resolver;
pub use retry::RetryPolicy;
pub use status::{parse_origin_ids, StatusUpdate};
pub use validator::Validator;
pub use tracker_common::{TrackerError, TrackerResult};
