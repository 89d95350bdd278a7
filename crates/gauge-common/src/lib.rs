//! Common types shared by the gauge sync crates.
//!
//! Everything here is plain data: entities and their stored state, the
//! canonical observation shape, per-entity sync outcomes and the error
//! taxonomy. No I/O happens in this crate.

pub mod entity;
pub mod error;
pub mod observation;
pub mod outcome;
pub mod time;

pub use entity::{Entity, EntityFilter, EntityQuery, PriorRecord, StoredObservationState};
pub use error::{Result, SyncError};
pub use observation::{CanonicalObservation, CanonicalObservationSet, StreamLayout};
pub use outcome::{EntityOutcome, NoNewDataReason, RunReport, RunSummary, SyncOutcome};
pub use time::{parse_interval, parse_timestamp, ObservationTime, TimeWindow};
