//! Pipeline orchestrator: one source, every entity, one outcome each.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument};

use gauge_common::{
    Entity, EntityOutcome, EntityQuery, NoNewDataReason, Result, RunReport, SyncOutcome, TimeWindow,
};

use crate::detect::has_new_data;
use crate::load::SinkLoader;
use crate::resolve::StateResolver;
use crate::source::SourceAdapter;
use crate::store::ObservationStore;
use crate::transform::transform;

/// Per-source pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Which store entities belong to this source
    pub query: EntityQuery,
    /// Length of the trailing observation window
    pub interval: Duration,
    /// Store `type` tag for records, if the store partitions by type
    pub data_type: Option<String>,
    /// Entities processed at once
    pub concurrency: usize,
}

impl PipelineOptions {
    pub fn new(query: EntityQuery, interval: Duration) -> Self {
        Self {
            query,
            interval,
            data_type: None,
            concurrency: 4,
        }
    }
}

/// Drives each entity through resolve → extract → transform → detect → load.
pub struct Pipeline {
    source: Arc<dyn SourceAdapter>,
    resolver: StateResolver,
    loader: SinkLoader,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(source: Arc<dyn SourceAdapter>, store: Arc<dyn ObservationStore>, options: PipelineOptions) -> Self {
        let resolver = StateResolver::new(store.clone(), options.data_type.clone());
        let loader = SinkLoader::new(store, options.data_type.clone());

        Self {
            source,
            resolver,
            loader,
            options,
        }
    }

    /// Run over every entity with a window ending now.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Run over every entity with a window ending at `now`.
    ///
    /// Only a failure to list entities fails the run; per-entity problems
    /// land in the report as `Failed` outcomes.
    #[instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let started_at = Utc::now();
        let window = TimeWindow::trailing(self.options.interval, now);

        let entities = self.source.fetch_entity_list(&self.options.query).await?;
        info!(count = entities.len(), start = %window.start, end = %window.end, "Starting sync run");

        let window = &window;
        let outcomes: Vec<EntityOutcome> = stream::iter(entities)
            .map(|entity| async move {
                let outcome = self.sync_entity(&entity, window).await;
                EntityOutcome { entity, outcome }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let report = RunReport {
            source: self.source.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        self.record_metrics(&report);

        Ok(report)
    }

    /// One entity's full pass. Never fails; errors become `Failed`.
    pub async fn sync_entity(&self, entity: &Entity, window: &TimeWindow) -> SyncOutcome {
        let outcome = match self.try_sync_entity(entity, window).await {
            Ok(outcome) => outcome,
            Err(error) => SyncOutcome::Failed { error },
        };

        match &outcome {
            SyncOutcome::Failed { error } => {
                error!(uid = %entity.external_uid, error = %error, kind = error.kind(), "Entity sync failed");
            }
            SyncOutcome::NoNewData { reason } => {
                debug!(uid = %entity.external_uid, reason = %reason, "No new observations");
            }
            SyncOutcome::Skipped { reason } => {
                debug!(uid = %entity.external_uid, reason = %reason, "Entity skipped");
            }
            SyncOutcome::Loaded { .. } => {}
        }

        outcome
    }

    #[instrument(skip(self, window), fields(uid = %entity.external_uid))]
    async fn try_sync_entity(&self, entity: &Entity, window: &TimeWindow) -> Result<SyncOutcome> {
        let state = self.resolver.resolve(entity).await?;

        let batch = self.source.fetch_raw_observations(entity, window).await?;
        if batch.is_empty() {
            return Ok(no_new_data(NoNewDataReason::EmptyWindow));
        }

        let set = transform(&batch, self.source.layout());
        if set.is_empty() {
            return Ok(no_new_data(NoNewDataReason::NoUsablePoints));
        }

        if !has_new_data(&set, &state) {
            return Ok(no_new_data(NoNewDataReason::Unchanged));
        }

        Ok(self.loader.load(entity, set, state.prior_record_id()).await)
    }

    fn record_metrics(&self, report: &RunReport) {
        let source = report.source.clone();
        for entry in &report.outcomes {
            counter!(
                "gauge_sync_outcomes_total",
                "source" => source.clone(),
                "outcome" => entry.outcome.kind()
            )
            .increment(1);
        }
        histogram!("gauge_sync_run_duration_seconds", "source" => source).record(report.duration_secs());
    }
}

fn no_new_data(reason: NoNewDataReason) -> SyncOutcome {
    SyncOutcome::NoNewData { reason }
}
