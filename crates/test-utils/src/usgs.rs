//! NWIS instantaneous-values payloads.
//!
//! Points are `(dateTime, value)` pairs; values are strings the way NWIS
//! sends them.

use serde_json::{json, Value};

pub const NO_DATA_VALUE: f64 = -999999.0;

fn points(values: &[(&str, &str)]) -> Value {
    values
        .iter()
        .map(|(date_time, value)| json!({"dateTime": date_time, "value": value, "qualifiers": ["P"]}))
        .collect()
}

fn series(blocks: Vec<Value>) -> Value {
    json!({
        "sourceInfo": {
            "siteCode": [{"value": "02286400", "agencyCode": "USGS"}]
        },
        "variable": {
            "unit": {"unitCode": "ft"},
            "noDataValue": NO_DATA_VALUE
        },
        "values": blocks
    })
}

/// One time series with a single stream.
pub fn flat_response(values: &[(&str, &str)]) -> Value {
    json!({
        "value": {
            "timeSeries": [series(vec![json!({"value": points(values)})])]
        }
    })
}

/// One time series with an upstream and a downstream stream.
pub fn paired_response(upstream: &[(&str, &str)], downstream: &[(&str, &str)]) -> Value {
    json!({
        "value": {
            "timeSeries": [series(vec![
                json!({"value": points(upstream)}),
                json!({"value": points(downstream)}),
            ])]
        }
    })
}

/// A response with no time series.
pub fn empty_response() -> Value {
    json!({"value": {"timeSeries": []}})
}

/// A site listing with one time series per uid, all stream gauges in feet.
pub fn site_catalog(uids: &[&str]) -> Value {
    let series: Vec<Value> = uids
        .iter()
        .map(|uid| {
            json!({
                "sourceInfo": {
                    "siteCode": [{"value": uid}],
                    "siteProperty": [
                        {"name": "siteTypeCd", "value": "ST"},
                        {"name": "hucCd", "value": "03090202"}
                    ],
                    "geoLocation": {
                        "geogLocation": {"latitude": 26.1, "longitude": -80.2}
                    }
                },
                "variable": {
                    "unit": {"unitCode": "ft"},
                    "noDataValue": NO_DATA_VALUE
                },
                "values": [{"value": []}]
            })
        })
        .collect();

    json!({"value": {"timeSeries": series}})
}
