//! Stored-state resolution.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use gauge_common::time::timestamp_from_millis;
use gauge_common::{parse_timestamp, Entity, Result, StoredObservationState, SyncError};

use crate::store::{ObservationStore, StoredRecord};

/// Reads what the store currently holds for an entity.
pub struct StateResolver {
    store: Arc<dyn ObservationStore>,
    data_type: Option<String>,
}

impl StateResolver {
    pub fn new(store: Arc<dyn ObservationStore>, data_type: Option<String>) -> Self {
        Self { store, data_type }
    }

    /// Resolve the entity's last stored timestamp and record id.
    ///
    /// No record (or a record without observations) is the first-sync
    /// state, not an error. Store failures surface as `StoreUnavailable`.
    #[instrument(skip(self), fields(uid = %entity.external_uid))]
    pub async fn resolve(&self, entity: &Entity) -> Result<StoredObservationState> {
        let record = self
            .store
            .latest_record(entity.store_key(), self.data_type.as_deref())
            .await
            .map_err(|e| match e {
                SyncError::StoreUnavailable(_) => e,
                other => SyncError::StoreUnavailable(other.to_string()),
            })?;

        let state = match record {
            Some(record) => {
                if record.record_id.is_none() {
                    warn!("Latest stored record has no dataId, treating as first sync");
                }
                state_from_record(&record)?
            }
            None => StoredObservationState::first_sync(),
        };

        debug!(
            last_updated = ?state.last_updated_timestamp(),
            record_id = ?state.prior_record_id(),
            "Resolved stored state"
        );
        Ok(state)
    }
}

/// Extract the stored state from a record's observations.
///
/// Only the trailing primary point matters: the last element of a flat
/// record, or of `upstream` in a paired one. Earlier points and their
/// values are never decoded, so a record written before values were
/// normalized still resolves. A record without a `dataId` has nothing to
/// replace and resolves as a first sync.
pub fn state_from_record(record: &StoredRecord) -> Result<StoredObservationState> {
    let malformed = |detail: &str| {
        SyncError::StoreUnavailable(format!(
            "malformed observations in record {}: {}",
            record.record_id.as_deref().unwrap_or("<no dataId>"),
            detail
        ))
    };

    let primary: &[Value] = match &record.observations {
        Value::Null => return Ok(StoredObservationState::first_sync()),
        Value::Array(points) => points,
        Value::Object(streams) => match streams.get("upstream") {
            Some(Value::Array(points)) => points,
            None | Some(Value::Null) => &[],
            Some(_) => return Err(malformed("upstream is not an array")),
        },
        _ => return Err(malformed("expected an array or upstream/downstream streams")),
    };

    let Some(trailing) = primary.last() else {
        return Ok(StoredObservationState::first_sync());
    };

    let last_updated = match trailing.get("dateTime") {
        Some(Value::String(s)) => parse_timestamp(s),
        Some(Value::Number(n)) => n.as_i64().and_then(timestamp_from_millis),
        _ => None,
    }
    .ok_or_else(|| malformed("trailing point has no readable dateTime"))?;

    Ok(match &record.record_id {
        Some(record_id) => StoredObservationState::from_prior(record_id, last_updated),
        None => StoredObservationState::first_sync(),
    })
}
