//! Metadata store payloads.

use serde_json::{json, Value};

/// A `GET sensors` listing with six features (ids 4 through 9).
///
/// - 4, 5: `uid` uniqueId1/uniqueId2, class `sensorCode`
/// - 6: `uid` uniqueId3, class `otherSensorCode`
/// - 7: no inner properties at all
/// - 8: inner properties without a `uid`
/// - 9: `uid` foo, class `foo`
pub fn sensor_listing() -> Value {
    json!({
        "result": {
            "features": [
                sensor_feature(4, json!({"uid": "uniqueId1", "class": "sensorCode", "agency": "usgs"})),
                sensor_feature(5, json!({"uid": "uniqueId2", "class": "sensorCode", "agency": "usgs"})),
                sensor_feature(6, json!({"uid": "uniqueId3", "class": "otherSensorCode", "agency": "usgs"})),
                {"properties": {"id": 7, "otherProperty": "foo"}},
                sensor_feature(8, json!({"noUid": "foo", "agency": "usgs"})),
                sensor_feature(9, json!({"uid": "foo", "class": "foo", "agency": "usgs"})),
            ]
        }
    })
}

/// One listing feature with the given store id and metadata properties.
pub fn sensor_feature(id: i64, properties: Value) -> Value {
    json!({
        "properties": {
            "id": id,
            "properties": properties,
        }
    })
}

/// A `GET data/{key}` listing holding a single record.
pub fn record_listing(record_id: &str, observations: Value) -> Value {
    json!({
        "result": [
            {
                "dataId": record_id,
                "properties": {"observations": observations}
            }
        ]
    })
}
