//! SFWMD aggregate (station mean) adapter.
//!
//! Payload: `{ "list": [ { "myPoint": { "timestamp", "value" } } ] }`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Request};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use gauge_common::{Entity, EntityQuery, Result, StreamLayout, SyncError, TimeWindow};

use super::{fetch_json, RawObservationBatch, SourceAdapter};
use crate::store::EntityDirectory;

fn format_dt(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M").to_string()
}

#[derive(Debug, Deserialize)]
pub struct SfwmdResponse {
    #[serde(default)]
    pub list: Option<Vec<Value>>,
}

pub fn batch_from_response(response: SfwmdResponse) -> RawObservationBatch {
    match response.list {
        Some(points) if !points.is_empty() => RawObservationBatch::Sfwmd(points),
        _ => RawObservationBatch::Empty,
    }
}

/// Observation source backed by the SFWMD aggregate endpoint.
pub struct SfwmdAdapter {
    name: String,
    client: Client,
    base_url: String,
    directory: Arc<dyn EntityDirectory>,
}

impl SfwmdAdapter {
    pub fn new(
        name: impl Into<String>,
        client: Client,
        base_url: impl Into<String>,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            directory,
        }
    }

    pub fn observation_request(&self, entity: &Entity, window: &TimeWindow) -> reqwest::Result<Request> {
        let begin = format_dt(&window.start);
        let end = format_dt(&window.end);
        self.client
            .get(&self.base_url)
            .query(&[
                ("beginDateTime", begin.as_str()),
                ("endDateTime", end.as_str()),
                ("stationId", entity.external_uid.as_str()),
            ])
            .build()
    }
}

#[async_trait]
impl SourceAdapter for SfwmdAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Aggregates are a single series per station.
    fn layout(&self) -> StreamLayout {
        StreamLayout::Flat
    }

    async fn fetch_entity_list(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        self.directory.list_entities(query).await
    }

    #[instrument(skip(self, window), fields(source = %self.name, uid = %entity.external_uid))]
    async fn fetch_raw_observations(&self, entity: &Entity, window: &TimeWindow) -> Result<RawObservationBatch> {
        let request = self
            .observation_request(entity, window)
            .map_err(|e| SyncError::upstream(&self.name, e))?;
        let response: SfwmdResponse = fetch_json(&self.client, request, &self.name).await?;
        Ok(batch_from_response(response))
    }
}
