//! Metatracker service: command-line front end over the science catalog.

pub mod commands;
pub mod config_loader;

pub use commands::{FileOutcome, FileReport, SetupReport, TrackJob, TrackSummary};
pub use config_loader::{load_mission_config, resolve_mission_config};
