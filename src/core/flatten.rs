//! Turns one nested study into dotted-path leaves.
//!
//! Objects recurse with `prefix.key`, arrays of scalars collapse into a
//! single `", "`-joined field, other arrays recurse with integer segments.
//! Three keys get special treatment:
//!
//! - `locations` (array) becomes one `prefix.combined_locations_string`
//!   field, always present, empty when the list is empty.
//! - `centralContacts` and `overallOfficials` (arrays) keep only their
//!   first entry, under `prefix.key.0`.
//!
//! Empty objects and empty ordinary arrays produce no keys.

use crate::domain::model::{FlatRecord, FlatValue, RawRecord};
use serde_json::{Map, Value};

pub const LOCATIONS_KEY: &str = "locations";
pub const COMBINED_LOCATIONS_FIELD: &str = "combined_locations_string";
pub const FIRST_ENTRY_ONLY_KEYS: [&str; 2] = ["centralContacts", "overallOfficials"];

const MISSING_LOCATION_PART: &str = "N/A";

pub fn flatten(record: &RawRecord) -> FlatRecord {
    let mut out = FlatRecord::new();
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatRecord) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::Array(entries) if key == LOCATIONS_KEY => {
                        out.insert(
                            join_key(prefix, COMBINED_LOCATIONS_FIELD),
                            FlatValue::Text(combine_locations(entries)),
                        );
                    }
                    Value::Array(entries) if FIRST_ENTRY_ONLY_KEYS.contains(&key.as_str()) => {
                        if let Some(first) = entries.first() {
                            let first_prefix = join_key(&join_key(prefix, key), "0");
                            flatten_into(first, &first_prefix, out);
                        }
                    }
                    _ => flatten_into(child, &join_key(prefix, key), out),
                }
            }
        }
        Value::Array(items) if items.is_empty() => {}
        Value::Array(items) if items.iter().all(is_list_scalar) => {
            let joined = items
                .iter()
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(", ");
            out.insert(prefix, FlatValue::Text(joined));
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(item, &join_key(prefix, &index.to_string()), out);
            }
        }
        Value::Null => out.insert(prefix, FlatValue::empty()),
        Value::String(s) => out.insert(prefix, FlatValue::Text(s.clone())),
        Value::Number(n) => out.insert(prefix, FlatValue::Number(n.clone())),
        Value::Bool(b) => out.insert(prefix, FlatValue::Bool(*b)),
    }
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

// null is not joinable: a list containing one is flattened per element.
fn is_list_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `facility, city[, state], country` per entry, entries joined by `"; "`.
/// Non-object entries are skipped.
pub fn combine_locations(entries: &[Value]) -> String {
    entries
        .iter()
        .filter_map(Value::as_object)
        .map(location_phrase)
        .collect::<Vec<_>>()
        .join("; ")
}

fn location_phrase(location: &Map<String, Value>) -> String {
    let part = |name: &str| {
        location
            .get(name)
            .filter(|v| !v.is_null())
            .map(scalar_text)
            .unwrap_or_else(|| MISSING_LOCATION_PART.to_string())
    };

    let mut phrase = format!("{}, {}", part("facility"), part("city"));
    if let Some(state) = location
        .get("state")
        .map(scalar_text)
        .filter(|s| !s.is_empty())
    {
        phrase.push_str(", ");
        phrase.push_str(&state);
    }
    phrase.push_str(", ");
    phrase.push_str(&part("country"));
    phrase
}
