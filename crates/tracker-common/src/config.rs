//! Mission configuration: database location and the reference taxonomy
//! (instruments, instrument configurations, file levels, file types).
//!
//! A `MissionConfig` is built once at process start and passed by reference
//! to every component. Keys missing from a partial document fall back to the
//! built-in HERMES catalog.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{TrackerError, TrackerResult};

/// Environment variable that overrides `db_host`.
pub const DB_HOST_ENV: &str = "METATRACKER_DB_HOST";

/// Default database: a private in-memory SQLite database.
pub const DEFAULT_DB_HOST: &str = "sqlite::memory:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// sqlx connection string
    pub db_host: String,
    /// Prefix for every table name
    pub mission_name: String,
    pub instruments: Vec<InstrumentDef>,
    pub instrument_configurations: Vec<InstrumentConfigurationDef>,
    pub file_levels: Vec<FileLevelDef>,
    pub file_types: Vec<FileTypeDef>,
    /// Filename instrument codes (e.g. "EEA") to instrument short names
    pub instrument_codes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDef {
    pub instrument_id: i64,
    pub short_name: String,
    pub full_name: String,
    pub description: String,
}

/// One row of the instrument configuration table.
///
/// Slots are written the same way as the table columns:
/// `instrument_1_id`, `instrument_2_id`, ... each holding an instrument id or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfigurationDef {
    pub instrument_configuration_id: i64,
    #[serde(flatten)]
    pub slots: BTreeMap<String, Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLevelDef {
    pub short_name: String,
    pub full_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeDef {
    pub short_name: String,
    pub full_name: String,
    pub description: String,
    pub extension: String,
}

/// Column name of instrument slot `index` (1-based).
pub fn slot_column(index: usize) -> String {
    format!("instrument_{}_id", index)
}

fn parse_slot_key(key: &str) -> Option<usize> {
    key.strip_prefix("instrument_")?
        .strip_suffix("_id")?
        .parse::<usize>()
        .ok()
}

impl InstrumentConfigurationDef {
    /// Build a configuration from instrument ids, filling slots from 1.
    pub fn new(id: i64, instrument_ids: &[i64]) -> Self {
        let slots = instrument_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (slot_column(i + 1), Some(*id)))
            .collect();
        Self {
            instrument_configuration_id: id,
            slots,
        }
    }

    /// Slot values in column order, padded with None up to `slot_count`.
    pub fn slot_values(&self, slot_count: usize) -> TrackerResult<Vec<Option<i64>>> {
        let mut values = vec![None; slot_count];
        for (key, value) in &self.slots {
            let index = parse_slot_key(key)
                .filter(|i| (1..=slot_count).contains(i))
                .ok_or_else(|| {
                    TrackerError::Config(format!(
                        "Instrument configuration {} has invalid slot '{}' (expected instrument_1_id..instrument_{}_id)",
                        self.instrument_configuration_id, key, slot_count
                    ))
                })?;
            values[index - 1] = *value;
        }
        Ok(values)
    }

    /// Non-null instrument ids in slot order.
    pub fn instrument_ids(&self) -> Vec<i64> {
        let mut slots: Vec<(usize, i64)> = self
            .slots
            .iter()
            .filter_map(|(k, v)| Some((parse_slot_key(k)?, (*v)?)))
            .collect();
        slots.sort_unstable();
        slots.into_iter().map(|(_, id)| id).collect()
    }
}

impl MissionConfig {
    /// Number of instrument slots in the configuration table.
    pub fn slot_count(&self) -> usize {
        self.instruments.len()
    }

    /// Mission-namespaced table name, e.g. `hermes_science_file`.
    pub fn table_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.mission_name, suffix)
    }

    /// Apply `METATRACKER_DB_HOST` if it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_host) = std::env::var(DB_HOST_ENV) {
            if !db_host.trim().is_empty() {
                self.db_host = db_host;
            }
        }
    }

    /// Check internal consistency of the taxonomy.
    pub fn validate(&self) -> TrackerResult<()> {
        let valid_name = self
            .mission_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && self
                .mission_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(TrackerError::Config(format!(
                "mission_name '{}' must start with a letter and contain only letters, digits and '_'",
                self.mission_name
            )));
        }

        if self.db_host.trim().is_empty() {
            return Err(TrackerError::Config("db_host cannot be empty".to_string()));
        }

        if self.instruments.is_empty() {
            return Err(TrackerError::Config("at least one instrument is required".to_string()));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for inst in &self.instruments {
            if !ids.insert(inst.instrument_id) {
                return Err(TrackerError::Config(format!(
                    "duplicate instrument_id {}",
                    inst.instrument_id
                )));
            }
            if !names.insert(inst.short_name.as_str()) {
                return Err(TrackerError::Config(format!(
                    "duplicate instrument short_name '{}'",
                    inst.short_name
                )));
            }
        }

        let slot_count = self.slot_count();
        let mut config_ids = HashSet::new();
        for cfg in &self.instrument_configurations {
            if !config_ids.insert(cfg.instrument_configuration_id) {
                return Err(TrackerError::Config(format!(
                    "duplicate instrument_configuration_id {}",
                    cfg.instrument_configuration_id
                )));
            }
            let values = cfg.slot_values(slot_count)?;
            if values.iter().all(Option::is_none) {
                return Err(TrackerError::Config(format!(
                    "instrument configuration {} has no instruments",
                    cfg.instrument_configuration_id
                )));
            }
            if let Some(unknown) = values.iter().flatten().find(|id| !ids.contains(*id)) {
                return Err(TrackerError::Config(format!(
                    "instrument configuration {} references unknown instrument {}",
                    cfg.instrument_configuration_id, unknown
                )));
            }
        }

        let mut levels = HashSet::new();
        for level in &self.file_levels {
            if !levels.insert(level.short_name.as_str()) {
                return Err(TrackerError::Config(format!(
                    "duplicate file level '{}'",
                    level.short_name
                )));
            }
        }

        let mut types = HashSet::new();
        for file_type in &self.file_types {
            if !types.insert(file_type.short_name.as_str()) {
                return Err(TrackerError::Config(format!(
                    "duplicate file type '{}'",
                    file_type.short_name
                )));
            }
            if !file_type.extension.starts_with('.') || file_type.extension.len() < 2 {
                return Err(TrackerError::Config(format!(
                    "file type '{}' extension '{}' must start with '.'",
                    file_type.short_name, file_type.extension
                )));
            }
        }

        if let Some((code, name)) = self
            .instrument_codes
            .iter()
            .find(|(_, name)| !names.contains(name.as_str()))
        {
            return Err(TrackerError::Config(format!(
                "instrument code '{}' maps to unknown instrument '{}'",
                code, name
            )));
        }

        Ok(())
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        let instrument = |id: i64, short: &str, full: &str, desc: &str| InstrumentDef {
            instrument_id: id,
            short_name: short.to_string(),
            full_name: full.to_string(),
            description: desc.to_string(),
        };
        let level = |short: &str, full: &str, desc: &str| FileLevelDef {
            short_name: short.to_string(),
            full_name: full.to_string(),
            description: desc.to_string(),
        };
        let file_type = |short: &str, full: &str, desc: &str, ext: &str| FileTypeDef {
            short_name: short.to_string(),
            full_name: full.to_string(),
            description: desc.to_string(),
            extension: ext.to_string(),
        };

        let instruments = vec![
            instrument(1, "eea", "EEA", "Electron Electrostatic Analyzer (EEA)"),
            instrument(
                2,
                "nemisis",
                "NEMISIS",
                "Noise Eliminating Magnetometer Instrument in a Small Integrated System",
            ),
            instrument(3, "spani", "SPANI-I", "Solar Probe Analyzer for Ions"),
            instrument(4, "merit", "MERIT", "Miniaturized Electron pRoton Telescope"),
        ];

        let instrument_configurations = (1..=4)
            .map(|id| {
                let mut def = InstrumentConfigurationDef::new(id, &[id]);
                for slot in 2..=4 {
                    def.slots.insert(slot_column(slot), None);
                }
                def
            })
            .collect();

        let instrument_codes = [
            ("EEA", "eea"),
            ("NEM", "nemisis"),
            ("MAG", "nemisis"),
            ("SPN", "spani"),
            ("MER", "merit"),
            ("MERIT", "merit"),
        ]
        .into_iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect();

        Self {
            db_host: DEFAULT_DB_HOST.to_string(),
            mission_name: "hermes".to_string(),
            instruments,
            instrument_configurations,
            file_levels: vec![
                level("l0", "Level 0", "Level 0 File"),
                level("l1", "Level 1", "Level 1 File"),
                level("ql", "Quick Look", "Quick Look File"),
            ],
            file_types: vec![
                file_type("raw", "Raw Binary", "Raw Binary File", ".bin"),
                file_type("cdf", "Common Data Format", "Common Data Format File", ".cdf"),
            ],
            instrument_codes,
        }
    }
}
