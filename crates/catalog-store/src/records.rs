//! Science product, science file and status rows.
//!
//! Every function takes the connection of the caller's transaction so that one
//! engine step maps to exactly one transaction. Inserts never fail on a unique
//! conflict: they report `None` and the caller re-reads the winning row.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use tracker_common::TrackerResult;

use crate::catalog::Catalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ScienceProductRecord {
    pub science_product_id: i64,
    pub instrument_configuration_id: i64,
    pub mode: String,
    pub reference_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ScienceFileRecord {
    pub science_file_id: i64,
    pub science_product_id: i64,
    pub file_type: String,
    pub file_level: String,
    pub filename: String,
    pub file_version: String,
    pub file_size: i64,
    pub file_extension: String,
    pub file_path: String,
    pub storage_key: Option<String>,
    pub storage_location: Option<String>,
    pub file_modified_timestamp: DateTime<Utc>,
    pub is_public: bool,
}

/// Descriptive fields of a science file, before it has an id or product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewScienceFile {
    pub file_type: String,
    pub file_level: String,
    pub filename: String,
    pub file_version: String,
    pub file_size: i64,
    pub file_extension: String,
    pub file_path: String,
    pub storage_key: Option<String>,
    pub storage_location: Option<String>,
    pub file_modified_timestamp: DateTime<Utc>,
    pub is_public: bool,
}

#[derive(Debug, Clone, FromRow)]
struct StatusRow {
    status_id: i64,
    science_file_id: i64,
    processing_status: String,
    processing_status_message: Option<String>,
    original_processing_timestamp: DateTime<Utc>,
    last_processing_timestamp: DateTime<Utc>,
    reprocessed_count: i64,
    processing_time_length: Option<i64>,
}

/// A status row together with its origin file ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub status_id: i64,
    pub science_file_id: i64,
    pub processing_status: String,
    pub processing_status_message: Option<String>,
    pub original_processing_timestamp: DateTime<Utc>,
    pub last_processing_timestamp: DateTime<Utc>,
    pub reprocessed_count: i64,
    pub processing_time_length: Option<i64>,
    pub origin_file_ids: BTreeSet<i64>,
}

/// Values written by a status insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatus {
    pub processing_status: String,
    pub processing_status_message: Option<String>,
    pub processing_time_length: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl Catalog {
    // === Science products ===

    pub async fn find_science_product(
        &self,
        conn: &mut SqliteConnection,
        instrument_configuration_id: i64,
        mode: &str,
        reference_timestamp: DateTime<Utc>,
    ) -> TrackerResult<Option<i64>> {
        let sql = format!(
            "SELECT science_product_id FROM {} \
             WHERE instrument_configuration_id = ? AND mode = ? AND reference_timestamp = ?",
            self.tables().science_product
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(instrument_configuration_id)
            .bind(mode)
            .bind(reference_timestamp)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Insert a product. `None` when an identical product already exists.
    pub async fn insert_science_product(
        &self,
        conn: &mut SqliteConnection,
        instrument_configuration_id: i64,
        mode: &str,
        reference_timestamp: DateTime<Utc>,
    ) -> TrackerResult<Option<i64>> {
        let sql = format!(
            "INSERT INTO {} (instrument_configuration_id, mode, reference_timestamp) \
             VALUES (?, ?, ?) \
             ON CONFLICT (instrument_configuration_id, mode, reference_timestamp) DO NOTHING",
            self.tables().science_product
        );
        let result = sqlx::query(&sql)
            .bind(instrument_configuration_id)
            .bind(mode)
            .bind(reference_timestamp)
            .execute(&mut *conn)
            .await?;
        Ok((result.rows_affected() == 1).then(|| result.last_insert_rowid()))
    }

    pub async fn get_science_product(
        &self,
        conn: &mut SqliteConnection,
        science_product_id: i64,
    ) -> TrackerResult<Option<ScienceProductRecord>> {
        let sql = format!(
            "SELECT science_product_id, instrument_configuration_id, mode, reference_timestamp \
             FROM {} WHERE science_product_id = ?",
            self.tables().science_product
        );
        let record = sqlx::query_as::<_, ScienceProductRecord>(&sql)
            .bind(science_product_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record)
    }

    // === Science files ===

    /// `(science_file_id, science_product_id)` of the row named `filename`.
    pub async fn find_science_file(
        &self,
        conn: &mut SqliteConnection,
        filename: &str,
    ) -> TrackerResult<Option<(i64, i64)>> {
        let sql = format!(
            "SELECT science_file_id, science_product_id FROM {} WHERE filename = ?",
            self.tables().science_file
        );
        let row: Option<(i64, i64)> = sqlx::query_as(&sql)
            .bind(filename)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn get_science_file(
        &self,
        conn: &mut SqliteConnection,
        filename: &str,
    ) -> TrackerResult<Option<ScienceFileRecord>> {
        let sql = format!("SELECT * FROM {} WHERE filename = ?", self.tables().science_file);
        let record = sqlx::query_as::<_, ScienceFileRecord>(&sql)
            .bind(filename)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record)
    }

    pub async fn get_science_file_by_id(
        &self,
        conn: &mut SqliteConnection,
        science_file_id: i64,
    ) -> TrackerResult<Option<ScienceFileRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE science_file_id = ?",
            self.tables().science_file
        );
        let record = sqlx::query_as::<_, ScienceFileRecord>(&sql)
            .bind(science_file_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(record)
    }

    /// Insert a file. `None` when the filename is already tracked.
    pub async fn insert_science_file(
        &self,
        conn: &mut SqliteConnection,
        science_product_id: i64,
        file: &NewScienceFile,
    ) -> TrackerResult<Option<i64>> {
        let sql = format!(
            r#"INSERT INTO {} (
                science_product_id, file_type, file_level, filename, file_version,
                file_size, file_extension, file_path, storage_key, storage_location,
                file_modified_timestamp, is_public
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (filename) DO NOTHING"#,
            self.tables().science_file
        );
        let result = sqlx::query(&sql)
            .bind(science_product_id)
            .bind(&file.file_type)
            .bind(&file.file_level)
            .bind(&file.filename)
            .bind(&file.file_version)
            .bind(file.file_size)
            .bind(&file.file_extension)
            .bind(&file.file_path)
            .bind(&file.storage_key)
            .bind(&file.storage_location)
            .bind(file.file_modified_timestamp)
            .bind(file.is_public)
            .execute(&mut *conn)
            .await?;
        Ok((result.rows_affected() == 1).then(|| result.last_insert_rowid()))
    }

    /// Overwrite every descriptive field of an existing file row.
    pub async fn update_science_file(
        &self,
        conn: &mut SqliteConnection,
        science_file_id: i64,
        science_product_id: i64,
        file: &NewScienceFile,
    ) -> TrackerResult<()> {
        let sql = format!(
            r#"UPDATE {} SET
                science_product_id = ?, file_type = ?, file_level = ?, file_version = ?,
                file_size = ?, file_extension = ?, file_path = ?, storage_key = ?,
                storage_location = ?, file_modified_timestamp = ?, is_public = ?
            WHERE science_file_id = ?"#,
            self.tables().science_file
        );
        sqlx::query(&sql)
            .bind(science_product_id)
            .bind(&file.file_type)
            .bind(&file.file_level)
            .bind(&file.file_version)
            .bind(file.file_size)
            .bind(&file.file_extension)
            .bind(&file.file_path)
            .bind(&file.storage_key)
            .bind(&file.storage_location)
            .bind(file.file_modified_timestamp)
            .bind(file.is_public)
            .bind(science_file_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Which of `ids` have no science file row.
    pub async fn missing_science_files(
        &self,
        conn: &mut SqliteConnection,
        ids: &BTreeSet<i64>,
    ) -> TrackerResult<Vec<i64>> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE science_file_id = ?",
            self.tables().science_file
        );
        let mut missing = Vec::new();
        for id in ids {
            let row: Option<(i64,)> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            if row.is_none() {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    // === Status ===

    /// `(status_id, reprocessed_count)` for the file's status row.
    pub async fn find_status(
        &self,
        conn: &mut SqliteConnection,
        science_file_id: i64,
    ) -> TrackerResult<Option<(i64, i64)>> {
        let sql = format!(
            "SELECT status_id, reprocessed_count FROM {} WHERE science_file_id = ?",
            self.tables().status
        );
        let row: Option<(i64, i64)> = sqlx::query_as(&sql)
            .bind(science_file_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Insert a first status row. `None` when the file already has one.
    pub async fn insert_status(
        &self,
        conn: &mut SqliteConnection,
        science_file_id: i64,
        status: &NewStatus,
    ) -> TrackerResult<Option<i64>> {
        let sql = format!(
            r#"INSERT INTO {} (
                science_file_id, processing_status, processing_status_message,
                original_processing_timestamp, last_processing_timestamp,
                reprocessed_count, processing_time_length
            ) VALUES (?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT (science_file_id) DO NOTHING"#,
            self.tables().status
        );
        let result = sqlx::query(&sql)
            .bind(science_file_id)
            .bind(&status.processing_status)
            .bind(&status.processing_status_message)
            .bind(status.timestamp)
            .bind(status.timestamp)
            .bind(status.processing_time_length)
            .execute(&mut *conn)
            .await?;
        Ok((result.rows_affected() == 1).then(|| result.last_insert_rowid()))
    }

    /// Record a reprocessing run on an existing status row.
    ///
    /// `processing_time_length` keeps its stored value when the update carries none.
    pub async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        status_id: i64,
        status: &NewStatus,
    ) -> TrackerResult<()> {
        let sql = format!(
            r#"UPDATE {} SET
                processing_status = ?,
                processing_status_message = ?,
                last_processing_timestamp = ?,
                reprocessed_count = reprocessed_count + 1,
                processing_time_length = COALESCE(?, processing_time_length)
            WHERE status_id = ?"#,
            self.tables().status
        );
        sqlx::query(&sql)
            .bind(&status.processing_status)
            .bind(&status.processing_status_message)
            .bind(status.timestamp)
            .bind(status.processing_time_length)
            .bind(status_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Union `origin_file_ids` into the status row's origin set.
    pub async fn add_origin_files(
        &self,
        conn: &mut SqliteConnection,
        status_id: i64,
        origin_file_ids: &BTreeSet<i64>,
    ) -> TrackerResult<()> {
        let sql = format!(
            "INSERT INTO {} (status_id, origin_file_id) VALUES (?, ?) \
             ON CONFLICT (status_id, origin_file_id) DO NOTHING",
            self.tables().status_origin
        );
        for origin in origin_file_ids {
            sqlx::query(&sql)
                .bind(status_id)
                .bind(origin)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub async fn origin_file_ids(
        &self,
        conn: &mut SqliteConnection,
        status_id: i64,
    ) -> TrackerResult<BTreeSet<i64>> {
        let sql = format!(
            "SELECT origin_file_id FROM {} WHERE status_id = ?",
            self.tables().status_origin
        );
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(status_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn get_status(
        &self,
        conn: &mut SqliteConnection,
        science_file_id: i64,
    ) -> TrackerResult<Option<StatusRecord>> {
        let sql = format!(
            "SELECT status_id, science_file_id, processing_status, processing_status_message, \
             original_processing_timestamp, last_processing_timestamp, reprocessed_count, \
             processing_time_length FROM {} WHERE science_file_id = ?",
            self.tables().status
        );
        let Some(row) = sqlx::query_as::<_, StatusRow>(&sql)
            .bind(science_file_id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let origin_file_ids = self.origin_file_ids(conn, row.status_id).await?;
        Ok(Some(StatusRecord {
            status_id: row.status_id,
            science_file_id: row.science_file_id,
            processing_status: row.processing_status,
            processing_status_message: row.processing_status_message,
            original_processing_timestamp: row.original_processing_timestamp,
            last_processing_timestamp: row.last_processing_timestamp,
            reprocessed_count: row.reprocessed_count,
            processing_time_length: row.processing_time_length,
            origin_file_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tracker_common::MissionConfig;

    async fn seeded() -> Catalog {
        let config = MissionConfig::default();
        let catalog = Catalog::connect(&config).await.unwrap();
        catalog.create_tables(&config).await.unwrap();
        catalog
    }

    fn new_file(filename: &str) -> NewScienceFile {
        NewScienceFile {
            file_type: "raw".to_string(),
            file_level: "l0".to_string(),
            filename: filename.to_string(),
            file_version: "01".to_string(),
            file_size: 128,
            file_extension: ".bin".to_string(),
            file_path: format!("/data/{}.bin", filename),
            storage_key: None,
            storage_location: None,
            file_modified_timestamp: Utc.with_ymd_and_hms(2022, 9, 16, 3, 0, 2).unwrap(),
            is_public: true,
        }
    }

    fn status(name: &str, time_length: Option<i64>) -> NewStatus {
        NewStatus {
            processing_status: name.to_string(),
            processing_status_message: None,
            processing_time_length: time_length,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_insert_conflict_returns_none() {
        let catalog = seeded().await;
        let ts = Utc.with_ymd_and_hms(2022, 9, 16, 3, 0, 2).unwrap();
        let mut tx = catalog.begin().await.unwrap();

        let id = catalog
            .insert_science_product(&mut tx, 1, "", ts)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(catalog.insert_science_product(&mut tx, 1, "", ts).await.unwrap(), None);
        assert_eq!(
            catalog.find_science_product(&mut tx, 1, "", ts).await.unwrap(),
            Some(id)
        );

        let record = catalog.get_science_product(&mut tx, id).await.unwrap().unwrap();
        assert_eq!(record.reference_timestamp, ts);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_insert_update_and_lookup() {
        let catalog = seeded().await;
        let ts = Utc.with_ymd_and_hms(2022, 9, 16, 3, 0, 2).unwrap();
        let mut tx = catalog.begin().await.unwrap();
        let product = catalog
            .insert_science_product(&mut tx, 2, "", ts)
            .await
            .unwrap()
            .unwrap();

        let file = new_file("hermes_MAG_l0_2022259-030002_v01");
        let id = catalog
            .insert_science_file(&mut tx, product, &file)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(catalog.insert_science_file(&mut tx, product, &file).await.unwrap(), None);

        let mut changed = file.clone();
        changed.storage_key = Some("bucket/key".to_string());
        catalog
            .update_science_file(&mut tx, id, product, &changed)
            .await
            .unwrap();

        let record = catalog
            .get_science_file(&mut tx, &file.filename)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.science_file_id, id);
        assert_eq!(record.storage_key.as_deref(), Some("bucket/key"));
        assert!(record.is_public);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_update_keeps_time_length_and_unions_origins() {
        let catalog = seeded().await;
        let ts = Utc.with_ymd_and_hms(2022, 9, 16, 3, 0, 2).unwrap();
        let mut tx = catalog.begin().await.unwrap();
        let product = catalog
            .insert_science_product(&mut tx, 1, "", ts)
            .await
            .unwrap()
            .unwrap();
        let a = catalog
            .insert_science_file(&mut tx, product, &new_file("a"))
            .await
            .unwrap()
            .unwrap();
        let b = catalog
            .insert_science_file(&mut tx, product, &new_file("b"))
            .await
            .unwrap()
            .unwrap();

        let status_id = catalog
            .insert_status(&mut tx, a, &status("queued", Some(12)))
            .await
            .unwrap()
            .unwrap();
        catalog
            .add_origin_files(&mut tx, status_id, &BTreeSet::from([b]))
            .await
            .unwrap();
        catalog
            .update_status(&mut tx, status_id, &status("done", None))
            .await
            .unwrap();
        catalog
            .add_origin_files(&mut tx, status_id, &BTreeSet::from([a, b]))
            .await
            .unwrap();

        let record = catalog.get_status(&mut tx, a).await.unwrap().unwrap();
        assert_eq!(record.processing_status, "done");
        assert_eq!(record.reprocessed_count, 1);
        assert_eq!(record.processing_time_length, Some(12));
        assert_eq!(record.origin_file_ids, BTreeSet::from([a, b]));

        assert_eq!(
            catalog
                .missing_science_files(&mut tx, &BTreeSet::from([a, 999]))
                .await
                .unwrap(),
            vec![999]
        );
        assert!(catalog.get_status(&mut tx, b).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }
}
