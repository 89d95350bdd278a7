//! Sensor registration: add upstream sites the store does not know yet.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use gauge_common::{Entity, EntityOutcome, EntityQuery, Result, RunReport, SyncOutcome};

use crate::store::EntityDirectory;

/// Sensor metadata as posted to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMetadata {
    pub properties: SensorProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProperties {
    pub uid: String,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    pub class: String,
    pub units: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Upstream listing of sensor sites.
#[async_trait]
pub trait SensorCatalog: Send + Sync {
    fn name(&self) -> &str;

    /// Every site the upstream currently reports.
    async fn fetch_sensor_catalog(&self) -> Result<Vec<SensorMetadata>>;
}

/// Registers catalog sensors that are missing from the store.
pub struct SensorRegistrar {
    catalog: Arc<dyn SensorCatalog>,
    directory: Arc<dyn EntityDirectory>,
    /// Selects already-registered sensors of this class
    existing: EntityQuery,
}

impl SensorRegistrar {
    pub fn new(catalog: Arc<dyn SensorCatalog>, directory: Arc<dyn EntityDirectory>, existing: EntityQuery) -> Self {
        Self {
            catalog,
            directory,
            existing,
        }
    }

    /// Register every unknown sensor; known ones are `Skipped`.
    ///
    /// Fails as a whole only when the store listing or the upstream
    /// catalog cannot be read.
    #[instrument(skip(self), fields(source = %self.catalog.name()))]
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();

        let mut known: HashSet<String> = self
            .directory
            .list_entities(&self.existing)
            .await?
            .into_iter()
            .map(|entity| entity.external_uid)
            .collect();
        debug!(count = known.len(), "Loaded registered sensor uids");

        let catalog = self.catalog.fetch_sensor_catalog().await?;

        let mut outcomes = Vec::with_capacity(catalog.len());
        for sensor in catalog {
            let uid = sensor.properties.uid.clone();

            let outcome = if known.contains(&uid) {
                SyncOutcome::skipped("already registered")
            } else {
                match self.directory.register_sensor(&sensor).await {
                    Ok(id) => {
                        info!(uid = %uid, id = %id, "Sensor added");
                        known.insert(uid.clone());
                        SyncOutcome::loaded(id)
                    }
                    Err(e) => {
                        let error = e.into_write_failure();
                        error!(uid = %uid, error = %error, "Error adding sensor");
                        SyncOutcome::Failed { error }
                    }
                }
            };

            outcomes.push(EntityOutcome {
                entity: Entity::new(uid),
                outcome,
            });
        }

        Ok(RunReport {
            source: self.catalog.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        })
    }
}
