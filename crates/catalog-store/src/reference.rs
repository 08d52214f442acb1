//! Reads against the seeded reference tables.

use sqlx::{Row, SqliteConnection};

use tracker_common::{
    slot_column, FileLevelDef, FileTypeDef, InstrumentConfigurationDef, InstrumentDef,
    TrackerResult,
};

use crate::catalog::Catalog;

impl Catalog {
    pub async fn instruments(&self, conn: &mut SqliteConnection) -> TrackerResult<Vec<InstrumentDef>> {
        let sql = format!(
            "SELECT instrument_id, short_name, full_name, description FROM {} ORDER BY instrument_id",
            self.tables().instrument
        );
        let rows: Vec<(i64, String, String, String)> =
            sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        Ok(rows
            .into_iter()
            .map(|(instrument_id, short_name, full_name, description)| InstrumentDef {
                instrument_id,
                short_name,
                full_name,
                description,
            })
            .collect())
    }

    pub async fn file_levels(&self, conn: &mut SqliteConnection) -> TrackerResult<Vec<FileLevelDef>> {
        let sql = format!(
            "SELECT short_name, full_name, description FROM {} ORDER BY short_name",
            self.tables().file_level
        );
        let rows: Vec<(String, String, String)> =
            sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        Ok(rows
            .into_iter()
            .map(|(short_name, full_name, description)| FileLevelDef {
                short_name,
                full_name,
                description,
            })
            .collect())
    }

    pub async fn file_types(&self, conn: &mut SqliteConnection) -> TrackerResult<Vec<FileTypeDef>> {
        let sql = format!(
            "SELECT short_name, full_name, description, extension FROM {} ORDER BY short_name",
            self.tables().file_type
        );
        let rows: Vec<(String, String, String, String)> =
            sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        Ok(rows
            .into_iter()
            .map(|(short_name, full_name, description, extension)| FileTypeDef {
                short_name,
                full_name,
                description,
                extension,
            })
            .collect())
    }

    /// All configurations with their slot columns, ordered by id.
    pub async fn instrument_configurations(
        &self,
        conn: &mut SqliteConnection,
    ) -> TrackerResult<Vec<InstrumentConfigurationDef>> {
        let slots: Vec<String> = (1..=self.slot_count()).map(slot_column).collect();
        let mut columns = vec!["instrument_configuration_id".to_string()];
        columns.extend(slots.iter().cloned());
        let sql = format!(
            "SELECT {} FROM {} ORDER BY instrument_configuration_id",
            columns.join(", "),
            self.tables().instrument_configuration
        );

        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
        let mut configurations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut def = InstrumentConfigurationDef {
                instrument_configuration_id: row.try_get("instrument_configuration_id")?,
                slots: Default::default(),
            };
            for column in &slots {
                let value: Option<i64> = row.try_get(column.as_str())?;
                def.slots.insert(column.clone(), value);
            }
            configurations.push(def);
        }
        Ok(configurations)
    }

    /// File type short name registered for `extension` (case-insensitive, leading dot).
    pub async fn file_type_for_extension(
        &self,
        conn: &mut SqliteConnection,
        extension: &str,
    ) -> TrackerResult<Option<String>> {
        let sql = format!(
            "SELECT short_name FROM {} WHERE lower(extension) = ? ORDER BY short_name LIMIT 1",
            self.tables().file_type
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(extension.to_lowercase())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|(name,)| name))
    }

    pub async fn file_level_exists(
        &self,
        conn: &mut SqliteConnection,
        level: &str,
    ) -> TrackerResult<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE short_name = ?",
            self.tables().file_level
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(level)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    pub async fn instrument_exists(
        &self,
        conn: &mut SqliteConnection,
        short_name: &str,
    ) -> TrackerResult<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE short_name = ?",
            self.tables().instrument
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(short_name)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }
}
