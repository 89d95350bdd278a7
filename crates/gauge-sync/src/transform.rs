//! Raw upstream batches to canonical observation sets.
//!
//! Pure functions. Points with a missing or unparseable timestamp or value
//! are dropped one at a time; survivors keep upstream order.

use serde_json::Value;

use gauge_common::time::timestamp_from_millis;
use gauge_common::{parse_timestamp, CanonicalObservation, CanonicalObservationSet, ObservationTime, StreamLayout};

use crate::source::usgs::UsgsSeries;
use crate::source::RawObservationBatch;

/// Map a raw batch into the canonical shape for `layout`.
pub fn transform(batch: &RawObservationBatch, layout: StreamLayout) -> CanonicalObservationSet {
    match batch {
        RawObservationBatch::Empty => CanonicalObservationSet::empty(layout),
        RawObservationBatch::Usgs(series) => transform_usgs(series, layout),
        RawObservationBatch::Sfwmd(points) => {
            let primary = points
                .iter()
                .filter_map(|point| {
                    let inner = point.get("myPoint")?;
                    canonical_point(inner.get("timestamp"), inner.get("value"), None)
                })
                .collect();
            shape(primary, Vec::new(), layout)
        }
    }
}

fn transform_usgs(series: &UsgsSeries, layout: StreamLayout) -> CanonicalObservationSet {
    let convert = |points: &[Value]| -> Vec<CanonicalObservation> {
        points
            .iter()
            .filter_map(|point| canonical_point(point.get("dateTime"), point.get("value"), series.no_data_value))
            .collect()
    };

    let secondary = match layout {
        StreamLayout::Paired => convert(series.stream(1)),
        StreamLayout::Flat => Vec::new(),
    };
    shape(convert(series.stream(0)), secondary, layout)
}

fn shape(primary: Vec<CanonicalObservation>, secondary: Vec<CanonicalObservation>, layout: StreamLayout) -> CanonicalObservationSet {
    match layout {
        StreamLayout::Flat => CanonicalObservationSet::Flat(primary),
        StreamLayout::Paired => CanonicalObservationSet::Paired {
            upstream: primary,
            downstream: secondary,
        },
    }
}

/// Build one observation, or `None` if the point is unusable.
fn canonical_point(timestamp: Option<&Value>, value: Option<&Value>, no_data: Option<f64>) -> Option<CanonicalObservation> {
    let timestamp = point_time(timestamp?)?;
    let value = point_value(value?)?;

    if no_data.is_some_and(|sentinel| value == sentinel) {
        return None;
    }

    Some(CanonicalObservation::new(timestamp, value))
}

fn point_time(raw: &Value) -> Option<ObservationTime> {
    match raw {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => timestamp_from_millis(n.as_i64()?),
        _ => None,
    }
}

fn point_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
