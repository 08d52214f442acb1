//! Common test fixtures for metatracker tests.
//!
//! Catalogs come back already set up and seeded with the default HERMES
//! taxonomy unless a config is passed in.

use std::path::Path;

use catalog_store::Catalog;
use tracker_common::{MissionConfig, ScienceFileMetadata, ScienceTime};

/// The default HERMES mission configuration (in-memory database).
pub fn hermes_config() -> MissionConfig {
    MissionConfig::default()
}

/// HERMES configuration pointing at `catalog.db` inside `dir`.
pub fn file_db_config(dir: &Path) -> MissionConfig {
    MissionConfig {
        db_host: format!("sqlite://{}", dir.join("catalog.db").display()),
        ..MissionConfig::default()
    }
}

/// Connect, create tables and seed reference rows for `config`.
pub async fn seeded_catalog(config: &MissionConfig) -> Catalog {
    let catalog = Catalog::connect(config)
        .await
        .expect("Failed to connect to test catalog");
    catalog
        .create_tables(config)
        .await
        .expect("Failed to create test tables");
    catalog
}

/// A fresh, seeded in-memory HERMES catalog.
pub async fn seeded_memory_catalog() -> Catalog {
    seeded_catalog(&hermes_config()).await
}

/// Metadata as a parser would report it for a single-instrument file.
pub fn science_metadata(instrument: &str, level: &str, time: Option<ScienceTime>) -> ScienceFileMetadata {
    ScienceFileMetadata {
        instrument: instrument.to_string(),
        mode: String::new(),
        level: level.to_string(),
        version: "01".to_string(),
        time,
    }
}

/// Fixed reference time used by the stub parsers: 2022-09-16T03:00:02.
pub fn reference_time() -> ScienceTime {
    ScienceTime::Text("2022-09-16T03:00:02.000".to_string())
}

/// A parser that ignores the file and always reports `instrument` / `level`
/// at `reference_time()`.
pub fn stub_parser(
    instrument: &str,
    level: &str,
) -> impl Fn(&Path) -> anyhow::Result<ScienceFileMetadata> + Send + Sync + 'static {
    let metadata = science_metadata(instrument, level, Some(reference_time()));
    move |_path: &Path| Ok(metadata.clone())
}

/// A parser that always fails.
pub fn failing_parser() -> impl Fn(&Path) -> anyhow::Result<ScienceFileMetadata> + Send + Sync + 'static
{
    |path: &Path| Err(anyhow::anyhow!("unreadable science file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_memory_catalog() {
        let catalog = seeded_memory_catalog().await;
        let count = catalog.row_count(&catalog.tables().instrument).await.unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_stub_parser_reports_fixed_metadata() {
        let parser = stub_parser("eea", "l0");
        let meta = parser(Path::new("anything.bin")).unwrap();
        assert_eq!(meta.instrument, "eea");
        assert_eq!(meta.level, "l0");
        assert!(meta.time.and_then(|t| t.to_utc()).is_some());
    }

    #[test]
    fn test_failing_parser() {
        assert!(failing_parser()(Path::new("x.bin")).is_err());
    }
}
