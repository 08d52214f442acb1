//! Reference table seeding.
//!
//! A reference table is only populated while it is empty; rows that already
//! exist (by short name or id) are skipped.

use tracing::{debug, info};

use tracker_common::{slot_column, MissionConfig, TrackerResult};

use crate::catalog::Catalog;

pub(crate) async fn populate_reference_tables(
    catalog: &Catalog,
    config: &MissionConfig,
) -> TrackerResult<()> {
    let tables = catalog.tables();

    if catalog.row_count(&tables.file_level).await? == 0 {
        let mut tx = catalog.begin().await?;
        let sql = format!(
            "INSERT INTO {} (short_name, full_name, description) VALUES (?, ?, ?) \
             ON CONFLICT (short_name) DO NOTHING",
            tables.file_level
        );
        for level in &config.file_levels {
            sqlx::query(&sql)
                .bind(&level.short_name)
                .bind(&level.full_name)
                .bind(&level.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(count = config.file_levels.len(), "Seeded file levels");
    } else {
        debug!(table = %tables.file_level, "Reference table already populated");
    }

    if catalog.row_count(&tables.file_type).await? == 0 {
        let mut tx = catalog.begin().await?;
        let sql = format!(
            "INSERT INTO {} (short_name, full_name, description, extension) VALUES (?, ?, ?, ?) \
             ON CONFLICT (short_name) DO NOTHING",
            tables.file_type
        );
        for file_type in &config.file_types {
            sqlx::query(&sql)
                .bind(&file_type.short_name)
                .bind(&file_type.full_name)
                .bind(&file_type.description)
                .bind(file_type.extension.to_lowercase())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(count = config.file_types.len(), "Seeded file types");
    } else {
        debug!(table = %tables.file_type, "Reference table already populated");
    }

    if catalog.row_count(&tables.instrument).await? == 0 {
        let mut tx = catalog.begin().await?;
        let sql = format!(
            "INSERT INTO {} (instrument_id, short_name, full_name, description) VALUES (?, ?, ?, ?) \
             ON CONFLICT DO NOTHING",
            tables.instrument
        );
        for inst in &config.instruments {
            sqlx::query(&sql)
                .bind(inst.instrument_id)
                .bind(&inst.short_name)
                .bind(&inst.full_name)
                .bind(&inst.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!(count = config.instruments.len(), "Seeded instruments");
    } else {
        debug!(table = %tables.instrument, "Reference table already populated");
    }

    if catalog.row_count(&tables.instrument_configuration).await? == 0 {
        let slot_count = catalog.slot_count();
        let mut columns = vec!["instrument_configuration_id".to_string()];
        columns.extend((1..=slot_count).map(slot_column));
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (instrument_configuration_id) DO NOTHING",
            tables.instrument_configuration,
            columns.join(", "),
            placeholders
        );

        let mut tx = catalog.begin().await?;
        for cfg in &config.instrument_configurations {
            let values = cfg.slot_values(slot_count)?;
            let mut query = sqlx::query(&sql).bind(cfg.instrument_configuration_id);
            for value in values {
                query = query.bind(value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!(
            count = config.instrument_configurations.len(),
            "Seeded instrument configurations"
        );
    } else {
        debug!(table = %tables.instrument_configuration, "Reference table already populated");
    }

    Ok(())
}
