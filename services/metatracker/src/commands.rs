//! Subcommand implementations.
//!
//! Each command opens the catalog from a resolved `MissionConfig`, does its
//! work through the tracker crates and returns a serializable report that
//! `main` prints as JSON on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use catalog_store::{Catalog, ScienceFileRecord, StatusRecord};
use tracker::{FilenameParser, MetaTracker, StatusUpdate, TrackRequest, TrackerOptions};
use tracker_common::MissionConfig;

/// Open the catalog, creating the tables when they are missing from an
/// in-memory database (which never outlives the process).
pub async fn open_catalog(config: &MissionConfig) -> Result<Catalog> {
    let catalog = Catalog::connect(config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.db_host))?;

    if !catalog.table_exists(&catalog.tables().science_file).await? {
        if is_memory_db(&config.db_host) {
            warn!("In-memory catalog has no tables, creating them for this run");
            catalog.create_tables(config).await?;
        } else {
            anyhow::bail!(
                "Catalog tables for mission '{}' do not exist, run `metatracker setup` first",
                config.mission_name
            );
        }
    }
    Ok(catalog)
}

fn is_memory_db(db_host: &str) -> bool {
    db_host.contains(":memory:") || db_host.contains("mode=memory")
}

// ============================================================================
// setup / teardown
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SetupReport {
    pub mission: String,
    pub tables: Vec<String>,
}

/// Create every catalog table and seed the reference data.
pub async fn setup(config: &MissionConfig) -> Result<SetupReport> {
    let catalog = Catalog::connect(config).await?;
    catalog
        .create_tables(config)
        .await
        .context("Failed to create catalog tables")?;
    let tables = catalog.list_tables().await?;
    catalog.close().await;

    info!(mission = %config.mission_name, tables = tables.len(), "Catalog ready");
    Ok(SetupReport {
        mission: config.mission_name.clone(),
        tables,
    })
}

/// Drop every catalog table of the mission.
pub async fn teardown(config: &MissionConfig) -> Result<SetupReport> {
    let catalog = Catalog::connect(config).await?;
    catalog
        .remove_tables()
        .await
        .context("Failed to remove catalog tables")?;
    let tables = catalog.list_tables().await?;
    catalog.close().await;

    info!(mission = %config.mission_name, "Catalog removed");
    Ok(SetupReport {
        mission: config.mission_name.clone(),
        tables,
    })
}

// ============================================================================
// track
// ============================================================================

/// Options of one `track` invocation.
#[derive(Debug, Clone)]
pub struct TrackJob {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    pub concurrency: usize,
    pub request: TrackRequest,
    pub options: TrackerOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub science_file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub science_product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackSummary {
    pub tracked: usize,
    pub failed: usize,
    pub results: Vec<FileOutcome>,
}

impl TrackSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Expand the given paths into the list of files to track.
///
/// Directories contribute their direct children, or every descendant with
/// `recursive`. Plain paths are passed through so a missing file is reported
/// per file rather than aborting the batch.
pub fn collect_files(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(path).min_depth(1).max_depth(max_depth).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", path))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Track every file of the job with the filename parser of the mission.
pub async fn track(config: &MissionConfig, job: &TrackJob) -> Result<TrackSummary> {
    let catalog = open_catalog(config).await?;
    let tracker = MetaTracker::new(catalog, FilenameParser::from_config(config), job.options).await?;

    let files = collect_files(&job.paths, job.recursive)?;
    info!(files = files.len(), concurrency = job.concurrency, "Tracking files");

    let summary = track_files(&tracker, files, &job.request, job.concurrency).await;
    tracker.catalog().close().await;
    Ok(summary)
}

/// Track a batch of files; a failing file is reported and the batch continues.
pub async fn track_files(
    tracker: &MetaTracker,
    files: Vec<PathBuf>,
    request: &TrackRequest,
    concurrency: usize,
) -> TrackSummary {
    let mut results: Vec<FileOutcome> = stream::iter(files)
        .map(|path| async move { track_one(tracker, &path, request).await })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by(|a, b| a.path.cmp(&b.path));

    let tracked = results.iter().filter(|r| r.ok).count();
    TrackSummary {
        tracked,
        failed: results.len() - tracked,
        results,
    }
}

async fn track_one(tracker: &MetaTracker, path: &Path, request: &TrackRequest) -> FileOutcome {
    let shown = path.display().to_string();
    match tracker.track(path, request).await {
        Ok(tracked) => FileOutcome {
            path: shown,
            ok: true,
            science_file_id: Some(tracked.science_file_id),
            science_product_id: Some(tracked.science_product_id),
            status_id: tracked.status_id,
            error_code: None,
            error: None,
        },
        Err(e) => {
            error!(
                path = %shown,
                error_code = e.error_code(),
                error = %e,
                "Failed to track file"
            );
            FileOutcome {
                path: shown,
                ok: false,
                science_file_id: None,
                science_product_id: None,
                status_id: None,
                error_code: Some(e.error_code()),
                error: Some(e.to_string()),
            }
        }
    }
}

// ============================================================================
// status / show
// ============================================================================

/// Record a processing run for an already tracked file.
pub async fn update_status(
    config: &MissionConfig,
    file_id: i64,
    update: &StatusUpdate,
    options: TrackerOptions,
) -> Result<StatusRecord> {
    let catalog = open_catalog(config).await?;
    let tracker = MetaTracker::new(catalog, FilenameParser::from_config(config), options).await?;
    tracker.upsert_status(file_id, update).await?;

    let catalog = tracker.catalog();
    let mut conn = catalog.acquire().await?;
    let record = catalog
        .get_status(&mut conn, file_id)
        .await?
        .context("Status row disappeared after update")?;
    drop(conn);
    catalog.close().await;
    Ok(record)
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: ScienceFileRecord,
    pub status: Option<StatusRecord>,
}

/// Look up a tracked file by filename (without extension).
pub async fn show(config: &MissionConfig, filename: &str) -> Result<Option<FileReport>> {
    let catalog = open_catalog(config).await?;
    let mut conn = catalog.acquire().await?;

    let report = match catalog.get_science_file(&mut conn, filename).await? {
        Some(file) => {
            let status = catalog.get_status(&mut conn, file.science_file_id).await?;
            Some(FileReport { file, status })
        }
        None => None,
    };
    drop(conn);
    catalog.close().await;
    Ok(report)
}
