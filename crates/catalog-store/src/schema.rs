//! Schema generation and introspection.
//!
//! The instrument configuration table has one nullable foreign key column per
//! configured instrument, so the DDL is built at setup time from the slot count.

use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, info};

use tracker_common::{slot_column, MissionConfig, TrackerError, TrackerResult};

use crate::catalog::Catalog;
use crate::seed;

/// Mission-namespaced table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub instrument: String,
    pub instrument_configuration: String,
    pub file_type: String,
    pub file_level: String,
    pub science_product: String,
    pub science_file: String,
    pub status: String,
    pub status_origin: String,
}

impl TableNames {
    pub fn new(mission: &str) -> Self {
        let name = |suffix: &str| format!("{}_{}", mission, suffix);
        Self {
            instrument: name("instrument"),
            instrument_configuration: name("instrument_configuration"),
            file_type: name("file_type"),
            file_level: name("file_level"),
            science_product: name("science_product"),
            science_file: name("science_file"),
            status: name("status"),
            status_origin: name("status_origin_association"),
        }
    }

    /// All tables, parents before children.
    pub fn in_creation_order(&self) -> [&str; 8] {
        [
            self.instrument.as_str(),
            self.instrument_configuration.as_str(),
            self.file_type.as_str(),
            self.file_level.as_str(),
            self.science_product.as_str(),
            self.science_file.as_str(),
            self.status.as_str(),
            self.status_origin.as_str(),
        ]
    }
}

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Emits the DDL for one mission.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    tables: TableNames,
    slot_count: usize,
}

impl SchemaBuilder {
    pub fn new(mission: &str, slot_count: usize) -> Self {
        Self {
            tables: TableNames::new(mission),
            slot_count,
        }
    }

    pub fn from_config(config: &MissionConfig) -> Self {
        Self::new(&config.mission_name, config.slot_count())
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// `(table, CREATE TABLE statement)` pairs in dependency order.
    pub fn statements(&self) -> Vec<(String, String)> {
        let t = &self.tables;
        vec![
            (t.instrument.clone(), self.instrument_ddl()),
            (
                t.instrument_configuration.clone(),
                self.instrument_configuration_ddl(),
            ),
            (t.file_type.clone(), self.file_type_ddl()),
            (t.file_level.clone(), self.file_level_ddl()),
            (t.science_product.clone(), self.science_product_ddl()),
            (t.science_file.clone(), self.science_file_ddl()),
            (t.status.clone(), self.status_ddl()),
            (t.status_origin.clone(), self.status_origin_ddl()),
        ]
    }

    fn instrument_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                instrument_id INTEGER PRIMARY KEY,
                short_name TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL,
                description TEXT NOT NULL
            )"#,
            self.tables.instrument
        )
    }

    pub fn instrument_configuration_ddl(&self) -> String {
        let slots: Vec<String> = (1..=self.slot_count)
            .map(|i| {
                format!(
                    "{} INTEGER REFERENCES {}(instrument_id)",
                    slot_column(i),
                    self.tables.instrument
                )
            })
            .collect();
        let mut columns = vec!["instrument_configuration_id INTEGER PRIMARY KEY".to_string()];
        columns.extend(slots);
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.tables.instrument_configuration,
            columns.join(",\n    ")
        )
    }

    fn file_type_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                short_name TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                description TEXT NOT NULL,
                extension TEXT NOT NULL
            )"#,
            self.tables.file_type
        )
    }

    fn file_level_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                short_name TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                description TEXT NOT NULL
            )"#,
            self.tables.file_level
        )
    }

    fn science_product_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                science_product_id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument_configuration_id INTEGER NOT NULL
                    REFERENCES {}(instrument_configuration_id),
                mode TEXT NOT NULL DEFAULT '',
                reference_timestamp TEXT NOT NULL,
                UNIQUE (instrument_configuration_id, mode, reference_timestamp)
            )"#,
            self.tables.science_product, self.tables.instrument_configuration
        )
    }

    fn science_file_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                science_file_id INTEGER PRIMARY KEY AUTOINCREMENT,
                science_product_id INTEGER NOT NULL
                    REFERENCES {}(science_product_id) ON DELETE CASCADE,
                file_type TEXT NOT NULL REFERENCES {}(short_name),
                file_level TEXT NOT NULL REFERENCES {}(short_name),
                filename TEXT NOT NULL UNIQUE,
                file_version TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_extension TEXT NOT NULL,
                file_path TEXT NOT NULL,
                storage_key TEXT,
                storage_location TEXT,
                file_modified_timestamp TEXT NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT 1
            )"#,
            self.tables.science_file,
            self.tables.science_product,
            self.tables.file_type,
            self.tables.file_level
        )
    }

    fn status_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                status_id INTEGER PRIMARY KEY AUTOINCREMENT,
                science_file_id INTEGER NOT NULL UNIQUE
                    REFERENCES {}(science_file_id) ON DELETE CASCADE,
                processing_status TEXT NOT NULL,
                processing_status_message TEXT,
                original_processing_timestamp TEXT NOT NULL,
                last_processing_timestamp TEXT NOT NULL,
                reprocessed_count INTEGER NOT NULL DEFAULT 0,
                processing_time_length INTEGER
            )"#,
            self.tables.status, self.tables.science_file
        )
    }

    fn status_origin_ddl(&self) -> String {
        format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                status_id INTEGER NOT NULL REFERENCES {}(status_id) ON DELETE CASCADE,
                origin_file_id INTEGER NOT NULL
                    REFERENCES {}(science_file_id) ON DELETE CASCADE,
                PRIMARY KEY (status_id, origin_file_id)
            )"#,
            self.tables.status_origin, self.tables.status, self.tables.science_file
        )
    }
}

impl Catalog {
    /// Create every missing table and seed empty reference tables. Idempotent.
    pub async fn create_tables(&self, config: &MissionConfig) -> TrackerResult<()> {
        if config.slot_count() != self.slot_count() {
            return Err(TrackerError::Config(format!(
                "configuration has {} instrument slots but the catalog was opened with {}",
                config.slot_count(),
                self.slot_count()
            )));
        }

        let builder = SchemaBuilder::from_config(config);
        for (table, ddl) in builder.statements() {
            if self.table_exists(&table).await? {
                debug!(table = %table, "Table already exists");
                continue;
            }
            sqlx::query(&ddl).execute(self.pool()).await?;
            info!(table = %table, "Created table");
        }

        seed::populate_reference_tables(self, config).await?;
        Ok(())
    }

    /// Drop every mission table, children first.
    pub async fn remove_tables(&self) -> TrackerResult<()> {
        for table in self.tables().in_creation_order().iter().rev() {
            let sql = format!("DROP TABLE IF EXISTS {}", table);
            sqlx::query(&sql).execute(self.pool()).await?;
            info!(table = %table, "Dropped table");
        }
        Ok(())
    }

    /// Names of all user tables in the database.
    pub async fn list_tables(&self) -> TrackerResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn table_exists(&self, table: &str) -> TrackerResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Column layout of `table`; empty when the table does not exist.
    pub async fn get_columns(&self, table: &str) -> TrackerResult<Vec<ColumnInfo>> {
        let columns = sqlx::query_as::<_, ColumnInfo>(
            r#"SELECT name, type AS data_type, "notnull" != 0 AS not_null, pk != 0 AS primary_key
               FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(self.pool())
        .await?;
        Ok(columns)
    }
}
