//! Per-source sync jobs and the polling loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::ValueEnum;
use metrics::counter;
use reqwest::Client;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use gauge_common::{EntityFilter, EntityQuery, RunReport};
use gauge_sync::{
    EntityDirectory, HttpStore, Pipeline, PipelineOptions, SensorRegistrar, SfwmdAdapter, SourceAdapter,
    UsgsAdapter, UsgsSiteCatalog, UsgsSiteQuery,
};

use crate::config::{SourceConfig, SourceKind};

/// Upper bound on the sleep between schedule checks.
const MAX_TICK: Duration = Duration::from_secs(60);

/// What a run synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Station observations
    Observations,
    /// Sensor metadata registration
    Sensors,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Observations => "observations",
            Mode::Sensors => "sensors",
        }
    }
}

/// Everything needed to sync one configured source.
pub struct SourceJob {
    pub id: String,
    poll_interval: Duration,
    pipeline: Pipeline,
    registrar: Option<SensorRegistrar>,
}

impl SourceJob {
    pub fn from_config(config: &SourceConfig, store: Arc<HttpStore>, client: Client) -> Result<Self> {
        let id = config.source.id.clone();
        let base_url = config.source.base_url.clone();
        let directory: Arc<dyn EntityDirectory> = store.clone();

        let source: Arc<dyn SourceAdapter> = match config.source.kind {
            SourceKind::Usgs => Arc::new(UsgsAdapter::new(
                id.clone(),
                client.clone(),
                base_url.clone(),
                config.observations.layout,
                directory.clone(),
            )),
            SourceKind::Sfwmd => Arc::new(SfwmdAdapter::new(
                id.clone(),
                client.clone(),
                base_url.clone(),
                directory.clone(),
            )),
        };

        let options = PipelineOptions {
            query: config.entities.clone(),
            interval: config.interval()?,
            data_type: config.observations.data_type.clone(),
            concurrency: config.schedule.concurrency,
        };

        let registrar = config.sensors.as_ref().map(|sensors| {
            let catalog = UsgsSiteCatalog::new(
                id.clone(),
                client,
                sensors.base_url.clone().unwrap_or(base_url),
                UsgsSiteQuery {
                    county_code: sensors.county_code.clone(),
                    parameter_code: sensors.parameter_code.clone(),
                    site_status: sensors.site_status.clone(),
                    sensor_class: sensors.sensor_class.clone(),
                },
            );
            // Registered sensors carry their uid under `uid` and their class under `class`
            let existing = EntityQuery::new("uid").with_filter(EntityFilter::PropertyEquals {
                property: "class".to_string(),
                value: sensors.sensor_class.clone(),
            });
            SensorRegistrar::new(Arc::new(catalog), directory, existing)
        });

        Ok(Self {
            id,
            poll_interval: config.poll_interval(),
            pipeline: Pipeline::new(source, store, options),
            registrar,
        })
    }
}

/// Results of one pass over every job.
#[derive(Debug, Default)]
pub struct RunTotals {
    pub reports: Vec<RunReport>,
    /// Sources whose run failed as a whole
    pub systemic_failures: usize,
}

impl RunTotals {
    pub fn entity_failures(&self) -> usize {
        self.reports.iter().map(|r| r.summary().failed).sum()
    }
}

/// Runs source jobs once or on their poll schedules.
pub struct Runner {
    jobs: Vec<SourceJob>,
    mode: Mode,
}

impl Runner {
    pub fn new(jobs: Vec<SourceJob>, mode: Mode) -> Self {
        Self { jobs, mode }
    }

    /// Run every job once, in configuration order.
    pub async fn run_once(&self) -> RunTotals {
        let mut totals = RunTotals::default();

        for job in &self.jobs {
            match self.run_job(job).await {
                Some(Ok(report)) => totals.reports.push(report),
                Some(Err(_)) => totals.systemic_failures += 1,
                None => {}
            }
        }

        totals
    }

    /// Poll each job on its own interval until shutdown.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut last_poll: HashMap<&str, Instant> = HashMap::new();
        let tick = self
            .jobs
            .iter()
            .map(|job| job.poll_interval)
            .min()
            .unwrap_or(MAX_TICK)
            .min(MAX_TICK);

        loop {
            for job in &self.jobs {
                let should_poll = match last_poll.get(job.id.as_str()) {
                    None => true,
                    Some(t) => t.elapsed() >= job.poll_interval,
                };

                if should_poll {
                    info!(source = %job.id, mode = self.mode.as_str(), "Running scheduled sync");
                    // Failures are already logged; the next poll retries
                    let _ = self.run_job(job).await;
                    last_poll.insert(job.id.as_str(), Instant::now());
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down runner");
                    break;
                }
                _ = tokio::time::sleep(tick) => {}
            }
        }
    }

    /// `None` when the job has nothing to do in this mode.
    #[instrument(skip(self, job), fields(source = %job.id, mode = self.mode.as_str()))]
    async fn run_job(&self, job: &SourceJob) -> Option<gauge_common::Result<RunReport>> {
        let result = match self.mode {
            Mode::Observations => job.pipeline.run().await,
            Mode::Sensors => match &job.registrar {
                Some(registrar) => registrar.run().await,
                None => {
                    debug!("Source has no sensor catalog, skipping");
                    return None;
                }
            },
        };

        match &result {
            Ok(report) => log_report(report, self.mode),
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Source run failed");
                counter!(
                    "gauge_sync_run_failures_total",
                    "source" => job.id.clone(),
                    "mode" => self.mode.as_str()
                )
                .increment(1);
            }
        }

        Some(result)
    }
}

/// One summary line per source run.
pub fn log_report(report: &RunReport, mode: Mode) {
    let summary = report.summary();

    if report.has_failures() {
        warn!(
            source = %report.source,
            mode = mode.as_str(),
            loaded = summary.loaded,
            no_new_data = summary.no_new_data,
            skipped = summary.skipped,
            failed = summary.failed,
            cleanup_failures = summary.cleanup_failures,
            duration_secs = report.duration_secs(),
            "Sync run finished with failures"
        );
    } else {
        info!(
            source = %report.source,
            mode = mode.as_str(),
            loaded = summary.loaded,
            no_new_data = summary.no_new_data,
            skipped = summary.skipped,
            cleanup_failures = summary.cleanup_failures,
            duration_secs = report.duration_secs(),
            "Sync run finished"
        );
    }
}
