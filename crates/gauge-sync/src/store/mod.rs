//! Internal metadata/observation store interfaces.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use gauge_common::{CanonicalObservationSet, Entity, EntityQuery, Result};

use crate::sensors::SensorMetadata;

/// The latest observation record the store holds for an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Store-assigned record id; `None` when the row has no `dataId`
    pub record_id: Option<String>,
    /// Raw `observations` property; `Null` when the record has none
    pub observations: Value,
}

/// Body of a new observation record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewObservationRecord {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub observations: CanonicalObservationSet,
}

/// Observation records keyed by entity.
///
/// Errors: reads fail with `StoreUnavailable`, creates with `WriteFailed`,
/// deletes with `StaleCleanupFailed`.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Most recent record for the entity, optionally restricted to a data type.
    async fn latest_record(&self, entity_key: &str, data_type: Option<&str>) -> Result<Option<StoredRecord>>;

    /// Create a record and return its store-assigned id.
    async fn create_record(&self, entity_key: &str, record: &NewObservationRecord) -> Result<String>;

    /// Remove a record by id.
    async fn delete_record(&self, entity_key: &str, record_id: &str) -> Result<()>;
}

/// Station/sensor metadata listing.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Entities whose metadata satisfies the query, in store order.
    async fn list_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>>;

    /// Register a new sensor and return its store key.
    async fn register_sensor(&self, sensor: &SensorMetadata) -> Result<String>;
}
