//! USGS instantaneous-values (NWIS) adapter.
//!
//! Observation payloads nest readings under
//! `value.timeSeries[0].values[i].value[]`. In the paired layout
//! `values[0]` is the upstream gauge and `values[1]` the downstream one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Request};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use gauge_common::{Entity, EntityQuery, Result, StreamLayout, SyncError, TimeWindow};

use super::{fetch_json, RawObservationBatch, SourceAdapter};
use crate::sensors::{Location, SensorCatalog, SensorMetadata, SensorProperties};
use crate::store::EntityDirectory;

/// Window bounds as accepted by the NWIS `startDT`/`endDT` parameters.
fn format_dt(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%MZ").to_string()
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UsgsResponse {
    pub value: UsgsValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsgsValue {
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    #[serde(default)]
    pub source_info: Option<SourceInfo>,
    #[serde(default)]
    pub variable: Option<Variable>,
    #[serde(default)]
    pub values: Vec<ValueBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueBlock {
    /// Points are kept as raw JSON so one malformed point cannot sink the batch
    #[serde(default)]
    pub value: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(default)]
    pub site_code: Vec<SiteCode>,
    #[serde(default)]
    pub site_property: Vec<SiteProperty>,
    #[serde(default)]
    pub geo_location: Option<GeoLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteCode {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteProperty {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    #[serde(default)]
    pub geog_location: Option<GeogLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeogLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub no_data_value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(default)]
    pub unit_code: Option<String>,
}

/// The observation streams of one USGS time series.
#[derive(Debug, Clone, PartialEq)]
pub struct UsgsSeries {
    /// Sentinel USGS uses for missing readings (typically -999999)
    pub no_data_value: Option<f64>,
    /// Raw points per `values[]` block, in upstream order
    pub streams: Vec<Vec<Value>>,
}

impl UsgsSeries {
    pub fn stream(&self, index: usize) -> &[Value] {
        self.streams.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Reduce a decoded response to a batch; zero primary points is `Empty`.
pub fn batch_from_response(response: UsgsResponse) -> RawObservationBatch {
    let Some(series) = response.value.time_series.into_iter().next() else {
        return RawObservationBatch::Empty;
    };

    let streams: Vec<Vec<Value>> = series.values.into_iter().map(|block| block.value).collect();
    if streams.first().map_or(true, Vec::is_empty) {
        return RawObservationBatch::Empty;
    }

    RawObservationBatch::Usgs(UsgsSeries {
        no_data_value: series.variable.and_then(|v| v.no_data_value),
        streams,
    })
}

// ============================================================================
// Observation adapter
// ============================================================================

/// Observation source backed by the NWIS instantaneous-values service.
pub struct UsgsAdapter {
    name: String,
    client: Client,
    /// Service URL including fixed parameters, e.g.
    /// "https://waterservices.usgs.gov/nwis/iv/?format=json&parameterCd=00065"
    base_url: String,
    layout: StreamLayout,
    directory: Arc<dyn EntityDirectory>,
}

impl UsgsAdapter {
    pub fn new(
        name: impl Into<String>,
        client: Client,
        base_url: impl Into<String>,
        layout: StreamLayout,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            layout,
            directory,
        }
    }

    /// Build the observation query for one site.
    pub fn observation_request(&self, entity: &Entity, window: &TimeWindow) -> reqwest::Result<Request> {
        let start = format_dt(&window.start);
        let end = format_dt(&window.end);
        self.client
            .get(&self.base_url)
            .query(&[
                ("sites", entity.external_uid.as_str()),
                ("startDT", start.as_str()),
                ("endDT", end.as_str()),
            ])
            .build()
    }
}

#[async_trait]
impl SourceAdapter for UsgsAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn layout(&self) -> StreamLayout {
        self.layout
    }

    async fn fetch_entity_list(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        self.directory.list_entities(query).await
    }

    #[instrument(skip(self, window), fields(source = %self.name, uid = %entity.external_uid))]
    async fn fetch_raw_observations(&self, entity: &Entity, window: &TimeWindow) -> Result<RawObservationBatch> {
        let request = self
            .observation_request(entity, window)
            .map_err(|e| SyncError::upstream(&self.name, e))?;
        let response: UsgsResponse = fetch_json(&self.client, request, &self.name).await?;
        Ok(batch_from_response(response))
    }
}

// ============================================================================
// Site catalog (sensor metadata)
// ============================================================================

/// Parameters of the NWIS site listing used for sensor registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsgsSiteQuery {
    pub county_code: String,
    pub parameter_code: String,
    pub site_status: String,
    /// Class recorded on registered sensors
    pub sensor_class: String,
}

/// Lists the sites NWIS reports for a county and parameter.
pub struct UsgsSiteCatalog {
    name: String,
    client: Client,
    base_url: String,
    query: UsgsSiteQuery,
}

impl UsgsSiteCatalog {
    pub fn new(name: impl Into<String>, client: Client, base_url: impl Into<String>, query: UsgsSiteQuery) -> Self {
        Self {
            name: name.into(),
            client,
            base_url: base_url.into(),
            query,
        }
    }

    pub fn catalog_request(&self) -> reqwest::Result<Request> {
        self.client
            .get(&self.base_url)
            .query(&[
                ("countyCd", self.query.county_code.as_str()),
                ("parameterCd", self.query.parameter_code.as_str()),
                ("siteStatus", self.query.site_status.as_str()),
            ])
            .build()
    }
}

/// Map one time series to sensor metadata; `None` if it carries no site code.
pub fn sensor_from_series(series: &TimeSeries, class: &str) -> Option<SensorMetadata> {
    let info = series.source_info.as_ref()?;
    let uid = info
        .site_code
        .first()
        .and_then(|code| code.value.clone())
        .filter(|uid| !uid.is_empty())?;

    let site_type = info
        .site_property
        .iter()
        .find(|p| p.name.as_deref() == Some("siteTypeCd"))
        .and_then(|p| p.value.clone());

    let units = series
        .variable
        .as_ref()
        .and_then(|v| v.unit.as_ref())
        .and_then(|u| u.unit_code.clone());

    let location = info
        .geo_location
        .as_ref()
        .and_then(|g| g.geog_location.as_ref())
        .and_then(|g| Some(Location { lat: g.latitude?, lng: g.longitude? }));

    Some(SensorMetadata {
        properties: SensorProperties {
            uid,
            site_type,
            class: class.to_string(),
            units,
        },
        location,
    })
}

#[async_trait]
impl SensorCatalog for UsgsSiteCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn fetch_sensor_catalog(&self) -> Result<Vec<SensorMetadata>> {
        let request = self
            .catalog_request()
            .map_err(|e| SyncError::upstream(&self.name, e))?;
        let response: UsgsResponse = fetch_json(&self.client, request, &self.name).await?;

        let total = response.value.time_series.len();
        let sensors: Vec<_> = response
            .value
            .time_series
            .iter()
            .filter_map(|series| sensor_from_series(series, &self.query.sensor_class))
            .collect();

        if sensors.len() < total {
            debug!(ignored = total - sensors.len(), "Ignored time series without a site code");
        }
        info!(count = sensors.len(), "Fetched USGS site catalog");

        Ok(sensors)
    }
}
