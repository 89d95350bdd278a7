//! Per-entity sync outcomes and run reports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::Entity;
use crate::error::SyncError;

/// Why an entity finished a run without a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoNewDataReason {
    /// Upstream reported zero observations for the window
    EmptyWindow,
    /// Trailing timestamp matches the stored record
    Unchanged,
    /// Every point in the batch was malformed
    NoUsablePoints,
}

impl fmt::Display for NoNewDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NoNewDataReason::EmptyWindow => "no observations in window",
            NoNewDataReason::Unchanged => "latest observation already stored",
            NoNewDataReason::NoUsablePoints => "no usable observations in batch",
        };
        f.write_str(msg)
    }
}

/// Terminal result of one entity's pass through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A new record landed. `cleanup_error` is set when the superseded
    /// record could not be removed; the load still counts as a success.
    Loaded {
        record_id: String,
        cleanup_error: Option<SyncError>,
    },
    NoNewData { reason: NoNewDataReason },
    Skipped { reason: String },
    Failed { error: SyncError },
}

impl SyncOutcome {
    pub fn loaded(record_id: impl Into<String>) -> Self {
        SyncOutcome::Loaded {
            record_id: record_id.into(),
            cleanup_error: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        SyncOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOutcome::Loaded { .. } => "loaded",
            SyncOutcome::NoNewData { .. } => "no_new_data",
            SyncOutcome::Skipped { .. } => "skipped",
            SyncOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            SyncOutcome::Loaded { record_id, .. } => Some(record_id),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncOutcome {
    fn from(error: SyncError) -> Self {
        SyncOutcome::Failed { error }
    }
}

/// Outcome tagged with the entity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOutcome {
    pub entity: Entity,
    pub outcome: SyncOutcome,
}

/// Counts per outcome kind for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub loaded: usize,
    pub no_new_data: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Loads whose stale record was left behind
    pub cleanup_failures: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.loaded + self.no_new_data + self.skipped + self.failed
    }
}

/// Every entity outcome from one run over one source.
///
/// Outcome order is not meaningful; there is exactly one per entity.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<EntityOutcome>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.outcomes {
            match &entry.outcome {
                SyncOutcome::Loaded { cleanup_error, .. } => {
                    summary.loaded += 1;
                    if cleanup_error.is_some() {
                        summary.cleanup_failures += 1;
                    }
                }
                SyncOutcome::NoNewData { .. } => summary.no_new_data += 1,
                SyncOutcome::Skipped { .. } => summary.skipped += 1,
                SyncOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Entity, &SyncError)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            SyncOutcome::Failed { error } => Some((&o.entity, error)),
            _ => None,
        })
    }

    /// Outcome recorded for the entity with the given upstream uid.
    pub fn outcome_for(&self, external_uid: &str) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.entity.external_uid == external_uid)
            .map(|o| &o.outcome)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
