//! Sink loader: write the new record, then retire the superseded one.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use gauge_common::{CanonicalObservationSet, Entity, SyncOutcome};

use crate::store::{NewObservationRecord, ObservationStore};

/// Persists canonical sets as store records.
///
/// Write and delete are two separate calls, not a transaction: both
/// records exist between them, and a failed delete leaves the old record
/// behind. The next run resolves against whichever record is newest.
pub struct SinkLoader {
    store: Arc<dyn ObservationStore>,
    data_type: Option<String>,
}

impl SinkLoader {
    pub fn new(store: Arc<dyn ObservationStore>, data_type: Option<String>) -> Self {
        Self { store, data_type }
    }

    /// Create a record for `set`; on success delete `prior_record_id` if given.
    ///
    /// A failed create is `Failed{WriteFailed}` and nothing is deleted. A
    /// failed delete still yields `Loaded`, carrying the cleanup error.
    #[instrument(skip(self, set), fields(uid = %entity.external_uid, points = set.point_count()))]
    pub async fn load(
        &self,
        entity: &Entity,
        set: CanonicalObservationSet,
        prior_record_id: Option<&str>,
    ) -> SyncOutcome {
        let key = entity.store_key();
        let record = NewObservationRecord {
            data_type: self.data_type.clone(),
            observations: set,
        };

        let record_id = match self.store.create_record(key, &record).await {
            Ok(id) => id,
            Err(e) => {
                return SyncOutcome::Failed {
                    error: e.into_write_failure(),
                }
            }
        };

        let cleanup_error = match prior_record_id {
            Some(prior) => match self.store.delete_record(key, prior).await {
                Ok(()) => {
                    info!(record_id = %record_id, replaced = %prior, "Observations updated");
                    None
                }
                Err(e) => {
                    let error = e.into_cleanup_failure();
                    warn!(
                        record_id = %record_id,
                        stale_record = %prior,
                        error = %error,
                        "Failed to remove previous observations"
                    );
                    Some(error)
                }
            },
            None => {
                info!(record_id = %record_id, "Observations stored");
                None
            }
        };

        SyncOutcome::Loaded {
            record_id,
            cleanup_error,
        }
    }
}
