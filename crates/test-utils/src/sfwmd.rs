//! SFWMD aggregate payloads.

use serde_json::{json, Value};

/// An aggregate listing of `(timestamp, value)` points.
pub fn aggregate_response(points: &[(&str, f64)]) -> Value {
    let list: Vec<Value> = points
        .iter()
        .map(|(timestamp, value)| json!({"myPoint": {"timestamp": timestamp, "value": value}}))
        .collect();
    json!({"list": list})
}
