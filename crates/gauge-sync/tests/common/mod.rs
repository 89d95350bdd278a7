//! In-memory fakes for gauge-sync integration tests.
//!
//! - `RecordingStore`: observation store + entity directory with a call log
//! - `ScriptedSource`: source adapter that replays canned batches per uid
//! - `StaticCatalog`: sensor catalog backed by a fixed list

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use gauge_common::{Entity, EntityQuery, Result, StreamLayout, SyncError, TimeWindow};
use gauge_sync::source::usgs::{batch_from_response, UsgsResponse};
use gauge_sync::{
    EntityDirectory, NewObservationRecord, ObservationStore, RawObservationBatch, SensorCatalog, SensorMetadata,
    SourceAdapter, StoredRecord,
};

/// One store call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Latest(String),
    Create(String),
    Delete(String, String),
    Register(String),
}

/// Store that keeps the newest record per entity key in memory.
#[derive(Default)]
pub struct RecordingStore {
    records: Mutex<HashMap<String, Vec<StoredRecord>>>,
    entities: Mutex<Vec<Entity>>,
    calls: Mutex<Vec<StoreCall>>,
    next_id: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_creates: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_listing: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let store = Self::default();
        *store.entities.lock().unwrap() = entities;
        store
    }

    /// Seed a record; new records get ids `rec-2`, `rec-3`, ...
    pub fn seed(&self, key: &str, record_id: &str, observations: Value) {
        self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().entry(key.to_string()).or_default().push(StoredRecord {
            record_id: Some(record_id.to_string()),
            observations,
        });
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than reads.
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, StoreCall::Latest(_)))
            .collect()
    }

    pub fn record_ids(&self, key: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .get(key)
            .map(|records| records.iter().map(|r| r.record_id.clone().unwrap_or_default()).collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, key: &str) -> Option<StoredRecord> {
        self.records.lock().unwrap().get(key).and_then(|r| r.last().cloned())
    }

    pub fn registered(&self) -> Vec<Entity> {
        self.entities.lock().unwrap().clone()
    }

    fn log(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObservationStore for RecordingStore {
    async fn latest_record(&self, entity_key: &str, _data_type: Option<&str>) -> Result<Option<StoredRecord>> {
        self.log(StoreCall::Latest(entity_key.to_string()));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::StoreUnavailable("connection refused".into()));
        }
        Ok(self.latest(entity_key))
    }

    async fn create_record(&self, entity_key: &str, record: &NewObservationRecord) -> Result<String> {
        self.log(StoreCall::Create(entity_key.to_string()));
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(SyncError::WriteFailed("HTTP 500".into()));
        }

        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let observations = serde_json::to_value(&record.observations).unwrap();
        self.records.lock().unwrap().entry(entity_key.to_string()).or_default().push(StoredRecord {
            record_id: Some(id.clone()),
            observations,
        });
        Ok(id)
    }

    async fn delete_record(&self, entity_key: &str, record_id: &str) -> Result<()> {
        self.log(StoreCall::Delete(entity_key.to_string(), record_id.to_string()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::StaleCleanupFailed("HTTP 503".into()));
        }
        if let Some(records) = self.records.lock().unwrap().get_mut(entity_key) {
            records.retain(|r| r.record_id.as_deref() != Some(record_id));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityDirectory for RecordingStore {
    async fn list_entities(&self, _query: &EntityQuery) -> Result<Vec<Entity>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(SyncError::StoreUnavailable("HTTP 502".into()));
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn register_sensor(&self, sensor: &SensorMetadata) -> Result<String> {
        let uid = sensor.properties.uid.clone();
        self.log(StoreCall::Register(uid.clone()));
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(SyncError::WriteFailed("HTTP 500".into()));
        }

        let mut entities = self.entities.lock().unwrap();
        let id = (entities.len() + 100).to_string();
        entities.push(Entity::with_key(uid, id.clone()));
        Ok(id)
    }
}

/// What the scripted source answers for one uid.
pub enum Script {
    Batch(RawObservationBatch),
    Unavailable,
}

/// Source adapter replaying canned answers; unknown uids get an empty batch.
pub struct ScriptedSource {
    layout: StreamLayout,
    entities: Option<Vec<Entity>>,
    scripts: Mutex<HashMap<String, Script>>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(layout: StreamLayout, entities: Vec<Entity>) -> Self {
        Self {
            layout,
            entities: Some(entities),
            scripts: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose entity listing fails.
    pub fn unlisted(layout: StreamLayout) -> Self {
        Self {
            entities: None,
            ..Self::new(layout, Vec::new())
        }
    }

    pub fn script(&self, uid: &str, script: Script) {
        self.scripts.lock().unwrap().insert(uid.to_string(), script);
    }

    /// Answer `uid` with a decoded NWIS payload.
    pub fn usgs_payload(&self, uid: &str, body: Value) {
        let response: UsgsResponse = serde_json::from_value(body).unwrap();
        self.script(uid, Script::Batch(batch_from_response(response)));
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn layout(&self) -> StreamLayout {
        self.layout
    }

    async fn fetch_entity_list(&self, _query: &EntityQuery) -> Result<Vec<Entity>> {
        self.entities
            .clone()
            .ok_or_else(|| SyncError::StoreUnavailable("entity listing timed out".into()))
    }

    async fn fetch_raw_observations(&self, entity: &Entity, _window: &TimeWindow) -> Result<RawObservationBatch> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().unwrap().get(&entity.external_uid) {
            Some(Script::Batch(batch)) => Ok(batch.clone()),
            Some(Script::Unavailable) => Err(SyncError::upstream("scripted", "HTTP 503")),
            None => Ok(RawObservationBatch::Empty),
        }
    }
}

/// Sensor catalog with a fixed answer.
pub struct StaticCatalog(pub Result<Vec<SensorMetadata>>);

#[async_trait]
impl SensorCatalog for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_sensor_catalog(&self) -> Result<Vec<SensorMetadata>> {
        self.0.clone()
    }
}
