//! Incremental synchronization of gauge observations.
//!
//! Pulls time-series readings and sensor metadata from upstream monitoring
//! APIs (USGS, SFWMD) and keeps the metadata store's observation records
//! in step with them.
//!
//! # Architecture
//!
//! Each entity makes one linear pass, stopping early when there is
//! nothing to do:
//!
//! - [`resolve`]: read the store's latest record for the entity
//! - [`source`]: fetch the raw upstream batch for the sync window
//! - [`transform`]: map the batch into canonical observations
//! - [`detect`]: compare trailing timestamps against the stored state
//! - [`load`]: write the new record, then remove the superseded one
//!
//! [`pipeline::Pipeline`] drives that pass for every entity of a source and
//! collects one [`SyncOutcome`] per entity. [`sensors::SensorRegistrar`]
//! registers upstream sites the store does not know yet.

pub mod detect;
pub mod load;
pub mod pipeline;
pub mod resolve;
pub mod sensors;
pub mod source;
pub mod store;
pub mod transform;

// Re-exports
pub use detect::has_new_data;
pub use gauge_common::{
    CanonicalObservation, CanonicalObservationSet, Entity, EntityFilter, EntityOutcome,
    EntityQuery, NoNewDataReason, Result, RunReport, RunSummary, StoredObservationState,
    StreamLayout, SyncError, SyncOutcome, TimeWindow,
};
pub use load::SinkLoader;
pub use pipeline::{Pipeline, PipelineOptions};
pub use resolve::StateResolver;
pub use sensors::{Location, SensorCatalog, SensorMetadata, SensorProperties, SensorRegistrar};
pub use source::{
    sfwmd::SfwmdAdapter,
    usgs::{UsgsAdapter, UsgsSiteCatalog, UsgsSiteQuery},
    RawObservationBatch, SourceAdapter,
};
pub use store::{http::HttpStore, http::HttpStoreConfig, EntityDirectory, NewObservationRecord, ObservationStore, StoredRecord};
pub use transform::transform;
