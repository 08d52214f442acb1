//! Checks candidate files against the reference catalog.

use catalog_store::Catalog;
use tracker_common::{ScienceTime, TrackerResult};

/// Read-only checks against the seeded reference tables.
///
/// Every check takes its own connection and releases it before returning.
#[derive(Clone)]
pub struct Validator {
    catalog: Catalog,
}

impl Validator {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Whether `extension` (leading dot, any case) is a registered file type.
    pub async fn is_valid_file_type(&self, extension: &str) -> TrackerResult<bool> {
        Ok(self.file_type_for_extension(extension).await?.is_some())
    }

    pub async fn file_type_for_extension(&self, extension: &str) -> TrackerResult<Option<String>> {
        let mut conn = self.catalog.acquire().await?;
        self.catalog.file_type_for_extension(&mut conn, extension).await
    }

    pub async fn is_valid_file_level(&self, level: &str) -> TrackerResult<bool> {
        let mut conn = self.catalog.acquire().await?;
        self.catalog.file_level_exists(&mut conn, level).await
    }

    pub async fn is_valid_instrument(&self, short_name: &str) -> TrackerResult<bool> {
        let mut conn = self.catalog.acquire().await?;
        self.catalog.instrument_exists(&mut conn, short_name).await
    }

    /// A time is valid when present and resolvable to a UTC instant.
    pub fn is_valid_timestamp(time: Option<&ScienceTime>) -> bool {
        time.and_then(ScienceTime::to_utc).is_some()
    }
}
