//! Ingest record format.
//!
//! Producers hand over one JSON object per node report:
//!
//! ```json
//! {"id": "!a1b2c3d4", "name": "Ridge", "latitude": 47.61, "longitude": -122.33, "timestamp": 1718000000.0}
//! ```
//!
//! Only `id` is required. `node_id` is accepted for `id`, and `lat`/`lon` for
//! `latitude`/`longitude`. A `null` field counts as absent. Anything else that
//! does not fit is rejected with a [`DropReason`] rather than guessed at.

use foundation::ids::NodeId;
use foundation::time::Time;
use scene::node_store::NodeUpdate;
use serde_json::{Map, Value};

/// Why a record was not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The line was not valid JSON.
    InvalidJson(String),
    /// The record was valid JSON but not an object.
    NotAnObject,
    MissingId,
    EmptyId,
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    /// A coordinate outside its valid range (or not a finite number).
    OutOfRange { field: &'static str, value: f64 },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::InvalidJson(err) => write!(f, "invalid json: {err}"),
            DropReason::NotAnObject => write!(f, "record is not an object"),
            DropReason::MissingId => write!(f, "record has no id"),
            DropReason::EmptyId => write!(f, "record id is empty"),
            DropReason::WrongType { field, expected } => {
                write!(f, "field '{field}' should be {expected}")
            }
            DropReason::OutOfRange { field, value } => {
                write!(f, "field '{field}' out of range: {value}")
            }
        }
    }
}

impl std::error::Error for DropReason {}

impl DropReason {
    /// Short stable tag for counting and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DropReason::InvalidJson(_) => "invalid_json",
            DropReason::NotAnObject => "not_an_object",
            DropReason::MissingId => "missing_id",
            DropReason::EmptyId => "empty_id",
            DropReason::WrongType { .. } => "wrong_type",
            DropReason::OutOfRange { .. } => "out_of_range",
        }
    }
}

/// Returns the first present, non-null value among `keys`.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn number(
    obj: &Map<String, Value>,
    keys: &[&str],
    field_name: &'static str,
) -> Result<Option<f64>, DropReason> {
    let Some(value) = field(obj, keys) else {
        return Ok(None);
    };
    let n = value.as_f64().ok_or(DropReason::WrongType {
        field: field_name,
        expected: "a number",
    })?;
    if !n.is_finite() {
        return Err(DropReason::OutOfRange {
            field: field_name,
            value: n,
        });
    }
    Ok(Some(n))
}

fn coordinate(
    obj: &Map<String, Value>,
    keys: &[&str],
    field_name: &'static str,
    limit: f64,
) -> Result<Option<f64>, DropReason> {
    let n = number(obj, keys, field_name)?;
    if let Some(v) = n
        && v.abs() > limit
    {
        return Err(DropReason::OutOfRange {
            field: field_name,
            value: v,
        });
    }
    Ok(n)
}

/// Decodes one already-parsed record.
pub fn parse_update(value: &Value) -> Result<NodeUpdate, DropReason> {
    let obj = value.as_object().ok_or(DropReason::NotAnObject)?;

    let id = match field(obj, &["id", "node_id"]) {
        None => return Err(DropReason::MissingId),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(DropReason::EmptyId),
        Some(Value::String(s)) => NodeId::new(s.as_str()),
        Some(_) => {
            return Err(DropReason::WrongType {
                field: "id",
                expected: "a string",
            });
        }
    };

    let name = match field(obj, &["name"]) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(DropReason::WrongType {
                field: "name",
                expected: "a string",
            });
        }
    };

    let lat_deg = coordinate(obj, &["latitude", "lat"], "latitude", 90.0)?;
    let lon_deg = coordinate(obj, &["longitude", "lon"], "longitude", 180.0)?;

    // Radios without a clock report zero.
    let timestamp = number(obj, &["timestamp"], "timestamp")?
        .filter(|t| *t > 0.0)
        .map(Time);

    Ok(NodeUpdate {
        id,
        name,
        lat_deg,
        lon_deg,
        timestamp,
    })
}

/// Decodes one JSON text line.
pub fn parse_line(line: &str) -> Result<NodeUpdate, DropReason> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| DropReason::InvalidJson(e.to_string()))?;
    parse_update(&value)
}

#[cfg(test)]
mod tests {
    use super::{DropReason, parse_line, parse_update};
    use foundation::time::Time;
    use serde_json::json;

    #[test]
    fn full_record() {
        let u = parse_update(&json!({
            "id": "!a1b2",
            "name": "Ridge",
            "latitude": 47.5,
            "longitude": -122.25,
            "timestamp": 1_700_000_000.0
        }))
        .unwrap();
        assert_eq!(u.id.as_str(), "!a1b2");
        assert_eq!(u.name.as_deref(), Some("Ridge"));
        assert_eq!(u.lat_deg, Some(47.5));
        assert_eq!(u.lon_deg, Some(-122.25));
        assert_eq!(u.timestamp, Some(Time(1_700_000_000.0)));
    }

    #[test]
    fn identity_only_record() {
        let u = parse_update(&json!({"id": "n1"})).unwrap();
        assert_eq!(u.name, None);
        assert_eq!(u.fix(), None);
        assert_eq!(u.timestamp, None);
    }

    #[test]
    fn aliases_and_nulls() {
        let u = parse_update(&json!({
            "node_id": "n2",
            "lat": 1,
            "lon": 2.5,
            "name": null,
            "timestamp": null
        }))
        .unwrap();
        assert_eq!(u.id.as_str(), "n2");
        assert_eq!(u.lat_deg, Some(1.0));
        assert_eq!(u.lon_deg, Some(2.5));
        assert_eq!(u.name, None);
        assert_eq!(u.timestamp, None);
    }

    #[test]
    fn zero_timestamp_is_absent() {
        let u = parse_update(&json!({"id": "n", "timestamp": 0})).unwrap();
        assert_eq!(u.timestamp, None);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(parse_update(&json!([1, 2])), Err(DropReason::NotAnObject));
        assert_eq!(parse_update(&json!({"name": "x"})), Err(DropReason::MissingId));
        assert_eq!(parse_update(&json!({"id": "  "})), Err(DropReason::EmptyId));
        assert_eq!(
            parse_update(&json!({"id": 42})),
            Err(DropReason::WrongType {
                field: "id",
                expected: "a string"
            })
        );
        assert_eq!(
            parse_update(&json!({"id": "a", "latitude": "47.1"})),
            Err(DropReason::WrongType {
                field: "latitude",
                expected: "a number"
            })
        );
        assert_eq!(
            parse_update(&json!({"id": "a", "name": 7})).unwrap_err().kind(),
            "wrong_type"
        );
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let err = parse_update(&json!({"id": "a", "latitude": 91.0, "longitude": 0.0}));
        assert_eq!(
            err,
            Err(DropReason::OutOfRange {
                field: "latitude",
                value: 91.0
            })
        );
        assert!(parse_update(&json!({"id": "a", "longitude": -180.5})).is_err());
    }

    #[test]
    fn parse_line_reports_invalid_json() {
        let err = parse_line("{not json").unwrap_err();
        assert_eq!(err.kind(), "invalid_json");
        assert!(parse_line(r#"{"id":"ok","lat":1.0,"lon":2.0}"#).is_ok());
    }
}
