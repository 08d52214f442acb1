//! Common types and utilities shared across the metatracker workspace.

pub mod config;
pub mod error;
pub mod metadata;
pub mod time;

pub use config::{
    slot_column, FileLevelDef, FileTypeDef, InstrumentConfigurationDef, InstrumentDef,
    MissionConfig, DB_HOST_ENV, DEFAULT_DB_HOST,
};
pub use error::{is_transient_sqlx, TrackerError, TrackerResult};
pub use metadata::ScienceFileMetadata;
pub use time::ScienceTime;
