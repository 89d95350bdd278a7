//! HTTP client for the metadata/observation store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use gauge_common::{Entity, EntityQuery, Result, SyncError};

use super::{EntityDirectory, NewObservationRecord, ObservationStore, StoredRecord};
use crate::sensors::SensorMetadata;

/// Connection settings for the store API.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL, e.g. "https://store.example.org/api"
    pub base_url: String,
    /// Sent as `x-api-key` when present
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Store client implementing both [`ObservationStore`] and [`EntityDirectory`].
pub struct HttpStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("store HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    async fn send_json(&self, request: RequestBuilder) -> std::result::Result<Value, String> {
        let response = send(request).await?;
        response.json().await.map_err(|e| format!("invalid JSON body: {e}"))
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> std::result::Result<Value, String> {
        self.send_json(self.request(Method::POST, path).json(body)).await
    }
}

async fn send(request: RequestBuilder) -> std::result::Result<Response, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("HTTP {status}: {body}"));
    }
    Ok(response)
}

#[async_trait]
impl ObservationStore for HttpStore {
    #[instrument(skip(self))]
    async fn latest_record(&self, entity_key: &str, data_type: Option<&str>) -> Result<Option<StoredRecord>> {
        let mut request = self.request(Method::GET, &format!("data/{entity_key}"));
        if let Some(data_type) = data_type {
            request = request.query(&[("type", data_type)]);
        }

        let body = self
            .send_json(request)
            .await
            .map_err(SyncError::StoreUnavailable)?;
        parse_latest_record(&body)
    }

    #[instrument(skip(self, record), fields(points = record.observations.point_count()))]
    async fn create_record(&self, entity_key: &str, record: &NewObservationRecord) -> Result<String> {
        let body = self
            .post_json(&format!("data/{entity_key}"), record)
            .await
            .map_err(SyncError::WriteFailed)?;
        let record_id = parse_created_id(&body, "dataId").map_err(SyncError::WriteFailed)?;
        debug!(record_id = %record_id, "Created observation record");
        Ok(record_id)
    }

    #[instrument(skip(self))]
    async fn delete_record(&self, entity_key: &str, record_id: &str) -> Result<()> {
        send(self.request(Method::DELETE, &format!("data/{entity_key}/{record_id}")))
            .await
            .map_err(SyncError::StaleCleanupFailed)?;
        Ok(())
    }
}

#[async_trait]
impl EntityDirectory for HttpStore {
    #[instrument(skip(self))]
    async fn list_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        let body = self
            .send_json(self.request(Method::GET, "sensors"))
            .await
            .map_err(SyncError::StoreUnavailable)?;
        let entities = parse_entity_list(&body, query)?;
        debug!(count = entities.len(), "Listed entities");
        Ok(entities)
    }

    #[instrument(skip(self, sensor), fields(uid = %sensor.properties.uid))]
    async fn register_sensor(&self, sensor: &SensorMetadata) -> Result<String> {
        let body = self
            .post_json("sensors", sensor)
            .await
            .map_err(SyncError::WriteFailed)?;
        parse_created_id(&body, "id").map_err(SyncError::WriteFailed)
    }
}

/// Store ids arrive as numbers or strings.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse `{ "result": { "features": [ { "properties": { "id", "properties": {..} } } ] } }`.
pub fn parse_entity_list(body: &Value, query: &EntityQuery) -> Result<Vec<Entity>> {
    let features = body
        .pointer("/result/features")
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::StoreUnavailable("entity listing has no result.features".into()))?;

    let entities = features
        .iter()
        .filter_map(|feature| {
            let outer = feature.get("properties")?;
            let inner = outer.get("properties")?.as_object()?;
            let uid = query.select(inner)?;
            Some(Entity {
                external_uid: uid,
                internal_key: outer.get("id").and_then(id_to_string),
            })
        })
        .collect();

    Ok(entities)
}

/// Parse `{ "result": [row, ...] }`, newest row first.
pub fn parse_latest_record(body: &Value) -> Result<Option<StoredRecord>> {
    let rows = body
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::StoreUnavailable(format!("malformed record listing: {body}")))?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let record_id = row.get("dataId").and_then(id_to_string);

    let observations = row
        .pointer("/properties/observations")
        .cloned()
        .unwrap_or(Value::Null);

    Ok(Some(StoredRecord {
        record_id,
        observations,
    }))
}

/// Pull the created id from `{ "result": { field } }` or `{ "result": [ { field } ] }`.
pub fn parse_created_id(body: &Value, field: &str) -> std::result::Result<String, String> {
    let result = body
        .get("result")
        .ok_or_else(|| format!("create response has no result: {body}"))?;

    let created = match result {
        Value::Array(rows) => rows.first(),
        other => Some(other),
    };

    created
        .and_then(|row| row.get(field))
        .and_then(id_to_string)
        .ok_or_else(|| format!("create response has no {field}: {body}"))
}
