//! The tracking engine.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use catalog_store::{Catalog, NewScienceFile, NewStatus};
use tracker_common::{TrackerError, TrackerResult};

use crate::file_info::FileInfo;
use crate::parser::ScienceFileParser;
use crate::resolver::Resolver;
use crate::retry::RetryPolicy;
use crate::status::StatusUpdate;
use crate::validator::Validator;

/// What to do when a filename is already tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileConflictPolicy {
    /// Return the existing row's id and leave it untouched
    #[default]
    KeepExisting,
    /// Overwrite the existing row's descriptive fields
    Overwrite,
}

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerOptions {
    pub retry: RetryPolicy,
    pub file_conflict: FileConflictPolicy,
}

/// Per-file inputs that do not come from the file itself.
#[derive(Debug, Clone, Default)]
pub struct TrackRequest {
    pub storage_key: Option<String>,
    pub storage_location: Option<String>,
    /// Known product id; skips the product lookup
    pub science_product_id: Option<i64>,
    pub status: Option<StatusUpdate>,
}

/// Ids assigned to a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackedFile {
    pub science_file_id: i64,
    pub science_product_id: i64,
    pub status_id: Option<i64>,
}

/// Validates science files and records them in the catalog.
///
/// Each upsert step runs in its own transaction and is retried on transient
/// store conflicts. Safe to share between tasks.
pub struct MetaTracker {
    catalog: Catalog,
    parser: Arc<dyn ScienceFileParser>,
    validator: Validator,
    resolver: Resolver,
    options: TrackerOptions,
}

impl MetaTracker {
    /// Create a tracker. Fails with `Connection` if the catalog is unreachable.
    pub async fn new<P>(catalog: Catalog, parser: P, options: TrackerOptions) -> TrackerResult<Self>
    where
        P: ScienceFileParser + 'static,
    {
        Self::with_shared_parser(catalog, Arc::new(parser), options).await
    }

    pub async fn with_shared_parser(
        catalog: Catalog,
        parser: Arc<dyn ScienceFileParser>,
        options: TrackerOptions,
    ) -> TrackerResult<Self> {
        catalog.ping().await?;
        Ok(Self {
            validator: Validator::new(catalog.clone()),
            resolver: Resolver::new(catalog.clone()),
            catalog,
            parser,
            options,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Validate, parse and record one science file.
    #[instrument(skip(self, path, request), fields(file = %path.display()))]
    pub async fn track(&self, path: &Path, request: &TrackRequest) -> TrackerResult<TrackedFile> {
        let info = FileInfo::inspect(path).await?;

        let file_type = self
            .validator
            .file_type_for_extension(&info.extension)
            .await?
            .ok_or_else(|| TrackerError::InvalidFileType {
                extension: info.extension.clone(),
                path: info.path.clone(),
            })?;

        let parsed = self
            .parser
            .parse(&info.path)
            .map_err(|source| TrackerError::Parser {
                path: info.path.clone(),
                source,
            })?;
        debug!(
            instrument = %parsed.instrument,
            level = %parsed.level,
            mode = %parsed.mode,
            version = %parsed.version,
            "Parsed science file"
        );

        if !self.validator.is_valid_file_level(&parsed.level).await? {
            return Err(TrackerError::InvalidFileLevel {
                level: parsed.level,
                filename: info.filename,
            });
        }

        let candidate = NewScienceFile {
            file_type,
            file_level: parsed.level.clone(),
            filename: info.filename.clone(),
            file_version: parsed.version.clone(),
            file_size: info.size,
            file_extension: info.extension.clone(),
            file_path: info.path_string(),
            storage_key: request.storage_key.clone(),
            storage_location: request.storage_location.clone(),
            file_modified_timestamp: info.modified,
            is_public: true,
        };

        let reference_timestamp = parsed
            .time
            .as_ref()
            .and_then(|t| t.to_utc())
            .ok_or_else(|| TrackerError::InvalidTimestamp {
                filename: info.filename.clone(),
                value: parsed.time.as_ref().map(|t| t.to_string()),
            })?;

        if !self.validator.is_valid_instrument(&parsed.instrument).await? {
            return Err(TrackerError::InvalidInstrument {
                instrument: parsed.instrument,
                filename: info.filename,
            });
        }
        let instruments = BTreeSet::from([parsed.instrument.clone()]);
        let configuration_id = self.resolver.resolve_configuration(&instruments).await?;

        let science_product_id = match request.science_product_id {
            Some(id) => id,
            None => {
                self.options
                    .retry
                    .run("upsert_science_product", || {
                        self.upsert_science_product(configuration_id, &parsed.mode, reference_timestamp)
                    })
                    .await?
            }
        };

        let science_file_id = self
            .options
            .retry
            .run("upsert_science_file", || {
                self.upsert_science_file(
                    science_product_id,
                    &candidate,
                    request.science_product_id.is_some(),
                )
            })
            .await?;

        let status_id = match &request.status {
            Some(update) => Some(self.upsert_status(science_file_id, update).await?),
            None => None,
        };

        info!(
            filename = %candidate.filename,
            science_file_id = science_file_id,
            science_product_id = science_product_id,
            status_id = ?status_id,
            "Tracked science file"
        );

        Ok(TrackedFile {
            science_file_id,
            science_product_id,
            status_id,
        })
    }

    /// Create or update the processing status of a tracked file.
    ///
    /// The first call creates the row; every later call bumps
    /// `reprocessed_count` and unions the origin file ids.
    pub async fn upsert_status(
        &self,
        science_file_id: i64,
        update: &StatusUpdate,
    ) -> TrackerResult<i64> {
        let origins = update.validate()?;
        self.options
            .retry
            .run("upsert_status", || {
                self.upsert_status_once(science_file_id, update, &origins)
            })
            .await
    }

    async fn upsert_science_product(
        &self,
        configuration_id: i64,
        mode: &str,
        reference_timestamp: DateTime<Utc>,
    ) -> TrackerResult<i64> {
        let mut tx = self.catalog.begin().await?;

        let existing = self
            .catalog
            .find_science_product(&mut tx, configuration_id, mode, reference_timestamp)
            .await?;
        let id = match existing {
            Some(id) => id,
            None => match self
                .catalog
                .insert_science_product(&mut tx, configuration_id, mode, reference_timestamp)
                .await?
            {
                Some(id) => {
                    debug!(science_product_id = id, "Created science product");
                    id
                }
                // Lost a race with a concurrent insert; adopt the winner
                None => self
                    .catalog
                    .find_science_product(&mut tx, configuration_id, mode, reference_timestamp)
                    .await?
                    .ok_or(TrackerError::Database(sqlx::Error::RowNotFound))?,
            },
        };

        tx.commit().await?;
        Ok(id)
    }

    async fn upsert_science_file(
        &self,
        science_product_id: i64,
        candidate: &NewScienceFile,
        product_supplied: bool,
    ) -> TrackerResult<i64> {
        let mut tx = self.catalog.begin().await?;

        if product_supplied
            && self
                .catalog
                .get_science_product(&mut tx, science_product_id)
                .await?
                .is_none()
        {
            return Err(TrackerError::InvalidArgument(format!(
                "science product {} does not exist",
                science_product_id
            )));
        }

        let existing = match self.catalog.find_science_file(&mut tx, &candidate.filename).await? {
            Some(row) => Some(row),
            None => match self
                .catalog
                .insert_science_file(&mut tx, science_product_id, candidate)
                .await?
            {
                Some(id) => {
                    tx.commit().await?;
                    debug!(science_file_id = id, "Created science file");
                    return Ok(id);
                }
                None => self.catalog.find_science_file(&mut tx, &candidate.filename).await?,
            },
        };
        let (science_file_id, existing_product_id) =
            existing.ok_or(TrackerError::Database(sqlx::Error::RowNotFound))?;

        match self.options.file_conflict {
            FileConflictPolicy::KeepExisting => {
                if existing_product_id != science_product_id {
                    warn!(
                        filename = %candidate.filename,
                        science_file_id = science_file_id,
                        existing_product_id = existing_product_id,
                        science_product_id = science_product_id,
                        "Science file already tracked under a different product"
                    );
                }
                debug!(science_file_id = science_file_id, "Science file already tracked");
            }
            FileConflictPolicy::Overwrite => {
                self.catalog
                    .update_science_file(&mut tx, science_file_id, science_product_id, candidate)
                    .await?;
                debug!(science_file_id = science_file_id, "Overwrote science file");
            }
        }

        tx.commit().await?;
        Ok(science_file_id)
    }

    async fn upsert_status_once(
        &self,
        science_file_id: i64,
        update: &StatusUpdate,
        origins: &BTreeSet<i64>,
    ) -> TrackerResult<i64> {
        let mut tx = self.catalog.begin().await?;

        if self
            .catalog
            .get_science_file_by_id(&mut tx, science_file_id)
            .await?
            .is_none()
        {
            return Err(TrackerError::InvalidArgument(format!(
                "science file {} does not exist",
                science_file_id
            )));
        }
        let missing = self.catalog.missing_science_files(&mut tx, origins).await?;
        if !missing.is_empty() {
            return Err(TrackerError::InvalidArgument(format!(
                "origin science files {:?} do not exist",
                missing
            )));
        }

        let status = NewStatus {
            processing_status: update.processing_status.clone(),
            processing_status_message: update.processing_status_message.clone(),
            processing_time_length: update.processing_time_length,
            timestamp: Utc::now(),
        };

        let status_id = match self.catalog.find_status(&mut tx, science_file_id).await? {
            Some((id, count)) => {
                self.catalog.update_status(&mut tx, id, &status).await?;
                debug!(status_id = id, reprocessed_count = count + 1, "Updated status");
                id
            }
            None => match self
                .catalog
                .insert_status(&mut tx, science_file_id, &status)
                .await?
            {
                Some(id) => {
                    debug!(status_id = id, "Created status");
                    id
                }
                // A concurrent writer created the row first; record this run as a reprocess
                None => {
                    let (id, _) = self
                        .catalog
                        .find_status(&mut tx, science_file_id)
                        .await?
                        .ok_or(TrackerError::Database(sqlx::Error::RowNotFound))?;
                    self.catalog.update_status(&mut tx, id, &status).await?;
                    id
                }
            },
        };

        self.catalog.add_origin_files(&mut tx, status_id, origins).await?;
        tx.commit().await?;
        Ok(status_id)
    }
}
