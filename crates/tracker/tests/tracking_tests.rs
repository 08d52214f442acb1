//! End-to-end tests for the tracking engine against an in-memory catalog.

use std::path::Path;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use test_utils::{
    assert_error_code, failing_parser, raw_filename, science_metadata, seeded_memory_catalog,
    stub_parser, write_science_file,
};
use tracker::{
    FileConflictPolicy, FilenameParser, MetaTracker, RetryPolicy, TrackRequest, TrackerError,
    TrackerOptions,
};
use tracker_common::{MissionConfig, ScienceFileMetadata, ScienceTime};

fn fast_options() -> TrackerOptions {
    TrackerOptions {
        retry: RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20)),
        file_conflict: FileConflictPolicy::KeepExisting,
    }
}

async fn stub_tracker(instrument: &str, level: &str) -> MetaTracker {
    let catalog = seeded_memory_catalog().await;
    MetaTracker::new(catalog, stub_parser(instrument, level), fast_options())
        .await
        .unwrap()
}

// ============================================================================
// Basic tracking
// ============================================================================

#[tokio::test]
async fn test_track_raw_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_MAG_l0_2022259-030002_v01.bin", 64);
    let tracker = stub_tracker("eea", "l0").await;

    let tracked = tracker.track(&path, &TrackRequest::default()).await.unwrap();
    assert!(tracked.science_file_id > 0);
    assert!(tracked.science_product_id > 0);
    assert_eq!(tracked.status_id, None);

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await.unwrap();
    let record = catalog
        .get_science_file(&mut conn, "hermes_MAG_l0_2022259-030002_v01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.file_level, "l0");
    assert_eq!(record.file_type, "raw");
    assert_eq!(record.file_extension, ".bin");
    assert_eq!(record.file_size, 64);
    assert!(record.is_public);
    assert!(Path::new(&record.file_path).is_absolute());

    let product = catalog
        .get_science_product(&mut conn, tracked.science_product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.instrument_configuration_id, 1);
    assert_eq!(
        product.reference_timestamp,
        Utc.with_ymd_and_hms(2022, 9, 16, 3, 0, 2).unwrap()
    );
}

#[tokio::test]
async fn test_track_with_filename_parser() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_MAG_l0_2022259-030002_v01.bin", 16);
    let catalog = seeded_memory_catalog().await;
    let parser = FilenameParser::from_config(&MissionConfig::default());
    let tracker = MetaTracker::new(catalog, parser, fast_options()).await.unwrap();

    let tracked = tokio_test::assert_ok!(tracker.track(&path, &TrackRequest::default()).await);

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await.unwrap();
    let product = catalog
        .get_science_product(&mut conn, tracked.science_product_id)
        .await
        .unwrap()
        .unwrap();
    // MAG maps to nemisis, the second configuration
    assert_eq!(product.instrument_configuration_id, 2);
}

#[tokio::test]
async fn test_tracking_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let tracker = stub_tracker("eea", "l0").await;

    let first = tracker.track(&path, &TrackRequest::default()).await.unwrap();
    let second = tracker.track(&path, &TrackRequest::default()).await.unwrap();

    assert_eq!(first, second);
    let catalog = tracker.catalog();
    assert_eq!(catalog.row_count(&catalog.tables().science_file).await.unwrap(), 1);
    assert_eq!(catalog.row_count(&catalog.tables().science_product).await.unwrap(), 1);
}

#[tokio::test]
async fn test_files_with_same_product_share_product_id() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let b = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v02.bin", 8);
    let tracker = stub_tracker("eea", "l0").await;

    let first = tracker.track(&a, &TrackRequest::default()).await.unwrap();
    let second = tracker.track(&b, &TrackRequest::default()).await.unwrap();

    assert_ne!(first.science_file_id, second.science_file_id);
    assert_eq!(first.science_product_id, second.science_product_id);
}

#[tokio::test]
async fn test_storage_fields_are_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let tracker = stub_tracker("eea", "l0").await;

    let request = TrackRequest {
        storage_key: Some("l0/2022/09/16/hermes_EEA_l0_2022259-030002_v01.bin".to_string()),
        storage_location: Some("hermes-eea".to_string()),
        ..Default::default()
    };
    tracker.track(&path, &request).await.unwrap();

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await.unwrap();
    let record = catalog
        .get_science_file(&mut conn, "hermes_EEA_l0_2022259-030002_v01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.storage_location.as_deref(), Some("hermes-eea"));
}

// ============================================================================
// Validation failures
// ============================================================================

#[tokio::test]
async fn test_unknown_extension_creates_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bop", 8);
    let tracker = stub_tracker("eea", "l0").await;

    let result = tracker.track(&path, &TrackRequest::default()).await;
    assert!(matches!(result, Err(TrackerError::InvalidFileType { ref extension, .. }) if extension == ".bop"));

    let catalog = tracker.catalog();
    assert_eq!(catalog.row_count(&catalog.tables().science_file).await.unwrap(), 0);
    assert_eq!(catalog.row_count(&catalog.tables().science_product).await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = stub_tracker("eea", "l0").await;
    let result = tracker
        .track(&dir.path().join("absent.bin"), &TrackRequest::default())
        .await;
    assert_error_code!(result, "file_not_found");
}

#[tokio::test]
async fn test_unknown_level_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l9_2022259-030002_v01.bin", 8);
    let tracker = stub_tracker("eea", "l9").await;
    let result = tracker.track(&path, &TrackRequest::default()).await;
    assert!(matches!(result, Err(TrackerError::InvalidFileLevel { ref level, .. }) if level == "l9"));
}

#[tokio::test]
async fn test_unknown_instrument_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_XYZ_l0_2022259-030002_v01.bin", 8);
    let tracker = stub_tracker("xyz", "l0").await;
    let result = tracker.track(&path, &TrackRequest::default()).await;
    assert_error_code!(result, "invalid_instrument");
}

#[tokio::test]
async fn test_missing_or_bad_time_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);

    let catalog = seeded_memory_catalog().await;
    let no_time = |_: &Path| -> anyhow::Result<ScienceFileMetadata> {
        Ok(science_metadata("eea", "l0", None))
    };
    let tracker = MetaTracker::new(catalog.clone(), no_time, fast_options()).await.unwrap();
    assert_error_code!(
        tracker.track(&path, &TrackRequest::default()).await,
        "invalid_timestamp"
    );

    let bad_time = |_: &Path| -> anyhow::Result<ScienceFileMetadata> {
        Ok(science_metadata(
            "eea",
            "l0",
            Some(ScienceTime::Text("sometime".to_string())),
        ))
    };
    let tracker = MetaTracker::new(catalog, bad_time, fast_options()).await.unwrap();
    let result = tracker.track(&path, &TrackRequest::default()).await;
    assert!(matches!(
        result,
        Err(TrackerError::InvalidTimestamp { value: Some(ref v), .. }) if v == "sometime"
    ));
}

#[tokio::test]
async fn test_parser_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let catalog = seeded_memory_catalog().await;
    let tracker = MetaTracker::new(catalog, failing_parser(), fast_options())
        .await
        .unwrap();

    let err = tracker
        .track(&path, &TrackRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Parser { .. }));
    assert!(!err.is_transient());
    assert!(!err.is_validation());
}

// ============================================================================
// Product override and conflict policy
// ============================================================================

#[tokio::test]
async fn test_supplied_product_id_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let b = write_science_file(dir.path(), "hermes_EEA_l0_2022260-000000_v01.bin", 8);
    let tracker = stub_tracker("eea", "l0").await;

    let first = tracker.track(&a, &TrackRequest::default()).await.unwrap();
    let request = TrackRequest {
        science_product_id: Some(first.science_product_id),
        ..Default::default()
    };
    let second = tracker.track(&b, &request).await.unwrap();
    assert_eq!(second.science_product_id, first.science_product_id);

    let request = TrackRequest {
        science_product_id: Some(999),
        ..Default::default()
    };
    let c = write_science_file(dir.path(), "hermes_EEA_l0_2022261-000000_v01.bin", 8);
    assert_error_code!(tracker.track(&c, &request).await, "invalid_argument");
}

#[tokio::test]
async fn test_keep_existing_leaves_row_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let tracker = stub_tracker("eea", "l0").await;

    tracker.track(&path, &TrackRequest::default()).await.unwrap();
    let request = TrackRequest {
        storage_key: Some("new/key".to_string()),
        ..Default::default()
    };
    tracker.track(&path, &request).await.unwrap();

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await.unwrap();
    let record = catalog
        .get_science_file(&mut conn, "hermes_EEA_l0_2022259-030002_v01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.storage_key, None);
}

#[tokio::test]
async fn test_overwrite_updates_storage_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_science_file(dir.path(), "hermes_EEA_l0_2022259-030002_v01.bin", 8);
    let catalog = seeded_memory_catalog().await;
    let options = TrackerOptions {
        file_conflict: FileConflictPolicy::Overwrite,
        ..fast_options()
    };
    let tracker = MetaTracker::new(catalog, stub_parser("eea", "l0"), options)
        .await
        .unwrap();

    let first = tracker.track(&path, &TrackRequest::default()).await.unwrap();
    std::fs::write(&path, vec![0u8; 32]).unwrap();
    let request = TrackRequest {
        storage_key: Some("new/key".to_string()),
        ..Default::default()
    };
    let second = tracker.track(&path, &request).await.unwrap();
    assert_eq!(first.science_file_id, second.science_file_id);

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await.unwrap();
    let record = catalog
        .get_science_file(&mut conn, "hermes_EEA_l0_2022259-030002_v01")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.storage_key.as_deref(), Some("new/key"));
    assert_eq!(record.file_size, 32);
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn test_closed_catalog_fails_construction() {
    let catalog = seeded_memory_catalog().await;
    catalog.close().await;
    let result = MetaTracker::new(catalog, stub_parser("eea", "l0"), fast_options()).await;
    assert!(matches!(result, Err(TrackerError::Connection(_))));
}

#[tokio::test]
async fn test_raw_filename_generator_matches_parser() {
    let t = Utc.with_ymd_and_hms(2023, 1, 1, 12, 30, 0).unwrap();
    let name = raw_filename("hermes", "SPN", t, 3);
    let meta = FilenameParser::from_config(&MissionConfig::default())
        .parse_filename(&name)
        .unwrap();
    assert_eq!(meta.instrument, "spani");
    assert_eq!(meta.time.and_then(|t| t.to_utc()), Some(t));
}
