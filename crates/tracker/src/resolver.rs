//! Maps sets of instruments to instrument configuration ids.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use catalog_store::Catalog;
use tracker_common::{TrackerError, TrackerResult};

/// Resolves instrument names against the seeded configuration table.
///
/// Configurations are few and never change after setup, so every call reads
/// them afresh instead of caching.
#[derive(Clone)]
pub struct Resolver {
    catalog: Catalog,
}

impl Resolver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Instrument id to short name.
    pub async fn get_instruments(&self) -> TrackerResult<BTreeMap<i64, String>> {
        let mut conn = self.catalog.acquire().await?;
        let instruments = self.catalog.instruments(&mut conn).await?;
        Ok(instruments
            .into_iter()
            .map(|inst| (inst.instrument_id, inst.short_name))
            .collect())
    }

    pub async fn get_instrument_by_id(&self, instrument_id: i64) -> TrackerResult<String> {
        self.get_instruments()
            .await?
            .remove(&instrument_id)
            .ok_or_else(|| {
                TrackerError::InvalidArgument(format!("unknown instrument id {}", instrument_id))
            })
    }

    /// Short names for `ids`, in the order given.
    pub async fn map_instrument_list(&self, ids: &[i64]) -> TrackerResult<Vec<String>> {
        let instruments = self.get_instruments().await?;
        ids.iter()
            .map(|id| {
                instruments.get(id).cloned().ok_or_else(|| {
                    TrackerError::InvalidArgument(format!("unknown instrument id {}", id))
                })
            })
            .collect()
    }

    /// Configuration id to the set of instrument short names in its slots.
    pub async fn get_instrument_configurations(
        &self,
    ) -> TrackerResult<BTreeMap<i64, BTreeSet<String>>> {
        let mut conn = self.catalog.acquire().await?;
        let instruments: BTreeMap<i64, String> = self
            .catalog
            .instruments(&mut conn)
            .await?
            .into_iter()
            .map(|inst| (inst.instrument_id, inst.short_name))
            .collect();
        let configurations = self.catalog.instrument_configurations(&mut conn).await?;

        configurations
            .into_iter()
            .map(|cfg| {
                let names = cfg
                    .instrument_ids()
                    .into_iter()
                    .map(|id| {
                        instruments.get(&id).cloned().ok_or_else(|| {
                            TrackerError::Config(format!(
                                "instrument configuration {} references unknown instrument {}",
                                cfg.instrument_configuration_id, id
                            ))
                        })
                    })
                    .collect::<TrackerResult<BTreeSet<String>>>()?;
                Ok((cfg.instrument_configuration_id, names))
            })
            .collect()
    }

    /// Id of the configuration whose instrument set equals `instruments` exactly.
    ///
    /// Slot order is irrelevant. When several configurations hold the same
    /// set, the lowest id wins.
    pub async fn resolve_configuration(
        &self,
        instruments: &BTreeSet<String>,
    ) -> TrackerResult<i64> {
        let configurations = self.get_instrument_configurations().await?;
        let found = configurations
            .into_iter()
            .find(|(_, members)| !members.is_empty() && members == instruments)
            .map(|(id, _)| id);

        match found {
            Some(id) => {
                debug!(configuration_id = id, instruments = ?instruments, "Resolved configuration");
                Ok(id)
            }
            None => Err(TrackerError::ConfigurationNotFound {
                instruments: instruments.iter().cloned().collect(),
            }),
        }
    }
}
