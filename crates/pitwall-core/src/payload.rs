//! Ingest payload model: parse, shape dispatch, numeric coercion.
//!
//! The relay treats telemetry as an open, producer-defined schema. Only the
//! handful of numeric fields the dashboards chart get defensive coercion;
//! everything else passes through untouched.

use serde_json::{Map, Value};

use crate::errors::RelayError;

/// Numeric fields substituted with a zero default when absent or malformed.
const NUMERIC_FIELDS: &[&str] = &["speed", "fuel_consumption", "emissions", "alignment_score"];

/// Parse a producer request body as JSON.
pub fn parse_body(body: &[u8]) -> Result<Value, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::MalformedPayload(e.to_string()))
}

/// Expand one ingest payload into the messages to broadcast.
///
/// A flat object is forwarded as-is. A `{timestamp, vehicles: [...]}` batch
/// becomes one message per vehicle, in list order, with the shared timestamp
/// merged into each element and numeric fields defaulted. Anything else
/// (array, scalar, null) expands to nothing.
pub fn expand(payload: Value) -> Vec<Value> {
    let Value::Object(mut obj) = payload else {
        return Vec::new();
    };

    match obj.remove("vehicles") {
        Some(Value::Array(vehicles)) => {
            let timestamp = obj.get("timestamp").cloned();
            vehicles
                .into_iter()
                .filter_map(|element| match element {
                    // A malformed element is skipped, never aborts the batch.
                    Value::Object(vehicle) => Some(expand_vehicle(vehicle, timestamp.as_ref())),
                    _ => None,
                })
                .collect()
        }
        // `vehicles` present but not a list: treat the whole object as one
        // flat message rather than guessing.
        Some(other) => {
            obj.insert("vehicles".to_string(), other);
            vec![Value::Object(obj)]
        }
        None => vec![Value::Object(obj)],
    }
}

fn expand_vehicle(mut vehicle: Map<String, Value>, shared_timestamp: Option<&Value>) -> Value {
    if let Some(ts) = shared_timestamp {
        // The element's own timestamp wins if it carries one.
        vehicle.entry("timestamp").or_insert_with(|| ts.clone());
    }
    for field in NUMERIC_FIELDS {
        let coerced = coerce_numeric(vehicle.get(*field));
        vehicle.insert((*field).to_string(), coerced);
    }
    Value::Object(vehicle)
}

/// Best-effort numeric read: numbers pass through, numeric strings parse,
/// everything else (including absence) falls back to zero.
fn coerce_numeric(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0)),
        _ => Value::from(0),
    }
}
