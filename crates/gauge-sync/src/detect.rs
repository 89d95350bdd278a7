//! Change detection on the trailing timestamp.
//!
//! Upstreams are treated as append-only: only the newest point of the
//! primary stream is compared with the stored state. Revisions to older
//! values are not detected.

use gauge_common::{CanonicalObservationSet, StoredObservationState};

/// Whether `set` carries data the store does not have yet.
///
/// Always true on first sync. Otherwise true unless the trailing timestamp
/// of the primary stream equals the stored last-updated timestamp.
pub fn has_new_data(set: &CanonicalObservationSet, state: &StoredObservationState) -> bool {
    let Some(stored) = state.last_updated_timestamp() else {
        return true;
    };

    match set.latest() {
        Some(latest) => latest.timestamp != *stored,
        None => true,
    }
}
