//! Canonical observation shape written to the store.

use serde::{Deserialize, Serialize};

use crate::time::ObservationTime;

/// One reading in the pipeline's normalized shape.
///
/// Serialized as `{"dateTime": ..., "value": ...}`, the layout the store
/// keeps under a record's `observations` property.
///
/// Values are normalized to `f64` whatever the upstream form, so `"3.450"`
/// is written back as `3.45`. Timestamps are written as RFC 3339 with the
/// offset they were parsed with (`+00:00` for naive upstream times).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObservation {
    #[serde(rename = "dateTime", with = "timestamp_format")]
    pub timestamp: ObservationTime,
    #[serde(deserialize_with = "lenient_f64")]
    pub value: f64,
}

impl CanonicalObservation {
    pub fn new(timestamp: ObservationTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Shape of a source's observation set, fixed per source in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamLayout {
    /// A single ordered sequence
    #[default]
    Flat,
    /// Upstream/downstream gauge pair; upstream is the primary stream
    Paired,
}

/// Observations for one entity, in upstream order.
///
/// Serializes as a bare array (flat) or as an `{upstream, downstream}`
/// object (paired). The two paired streams are independent and need not
/// share length or timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalObservationSet {
    Flat(Vec<CanonicalObservation>),
    Paired {
        #[serde(default)]
        upstream: Vec<CanonicalObservation>,
        #[serde(default)]
        downstream: Vec<CanonicalObservation>,
    },
}

impl CanonicalObservationSet {
    pub fn empty(layout: StreamLayout) -> Self {
        match layout {
            StreamLayout::Flat => CanonicalObservationSet::Flat(Vec::new()),
            StreamLayout::Paired => CanonicalObservationSet::Paired {
                upstream: Vec::new(),
                downstream: Vec::new(),
            },
        }
    }

    pub fn layout(&self) -> StreamLayout {
        match self {
            CanonicalObservationSet::Flat(_) => StreamLayout::Flat,
            CanonicalObservationSet::Paired { .. } => StreamLayout::Paired,
        }
    }

    /// The stream change detection is keyed on.
    pub fn primary(&self) -> &[CanonicalObservation] {
        match self {
            CanonicalObservationSet::Flat(points) => points,
            CanonicalObservationSet::Paired { upstream, .. } => upstream,
        }
    }

    /// Trailing point of the primary stream.
    pub fn latest(&self) -> Option<&CanonicalObservation> {
        self.primary().last()
    }

    /// True when the primary stream holds no points.
    pub fn is_empty(&self) -> bool {
        self.primary().is_empty()
    }

    /// Total points across all streams.
    pub fn point_count(&self) -> usize {
        match self {
            CanonicalObservationSet::Flat(points) => points.len(),
            CanonicalObservationSet::Paired { upstream, downstream } => {
                upstream.len() + downstream.len()
            }
        }
    }
}

mod timestamp_format {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::time::{parse_timestamp, ObservationTime};

    pub fn serialize<S: Serializer>(ts: &ObservationTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObservationTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// Older records store readings as strings ("3.45").
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("value out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("non-numeric value: {s}"))),
        other => Err(D::Error::custom(format!("unexpected value: {other}"))),
    }
}
