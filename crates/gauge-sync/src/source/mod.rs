//! Upstream source adapters.

pub mod sfwmd;
pub mod usgs;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request};
use serde::de::DeserializeOwned;
use tracing::debug;

use gauge_common::{Entity, EntityQuery, Result, StreamLayout, SyncError, TimeWindow};

/// Upstream payload as fetched; only the transformer looks inside.
#[derive(Debug, Clone, PartialEq)]
pub enum RawObservationBatch {
    /// Upstream reported zero observations in the window
    Empty,
    Usgs(usgs::UsgsSeries),
    Sfwmd(Vec<serde_json::Value>),
}

impl RawObservationBatch {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawObservationBatch::Empty)
    }
}

/// One upstream monitoring system.
///
/// `fetch_raw_observations` returns [`RawObservationBatch::Empty`] when the
/// window holds no readings and `UpstreamUnavailable` when the upstream
/// cannot be reached or answers with something undecodable. Adapters never
/// retry.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Shape of this source's observation sets.
    fn layout(&self) -> StreamLayout;

    /// Entities to sync, in listing order.
    async fn fetch_entity_list(&self, query: &EntityQuery) -> Result<Vec<Entity>>;

    /// Raw observations for one entity over the window.
    async fn fetch_raw_observations(&self, entity: &Entity, window: &TimeWindow) -> Result<RawObservationBatch>;
}

/// HTTP client shared by the upstream adapters.
pub fn upstream_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| SyncError::InvalidConfig(format!("upstream HTTP client: {e}")))
}

/// Execute a prepared request and decode its JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(client: &Client, request: Request, upstream: &str) -> Result<T> {
    debug!(url = %request.url(), "Querying upstream");

    let response = client
        .execute(request)
        .await
        .map_err(|e| SyncError::upstream(upstream, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::upstream(upstream, format!("HTTP {status}")));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::upstream(upstream, format!("malformed payload: {e}")))
}
