//! Source shape detection and standard-record normalization.
//!
//! Exports arrive in loosely typed JSON: names only present as map keys,
//! numeric ids, coordinates as strings, planets given as bare names, list
//! values where the model stores text. Normalization rewrites a record into
//! the canonical serde shape of [`System`] and then deserializes it, so the
//! model's own defaults apply.

use crate::model::system::{Moon, Planet, System};
use crate::model::validate::ValidationError;
use crate::repo::flat_file::META_KEY;
use serde_json::{Map, Value};

const SYSTEM_TEXT_FIELDS: [&str; 7] = [
    "fauna",
    "flora",
    "sentinel",
    "materials",
    "base_location",
    "photo",
    "attributes",
];

const BODY_TEXT_FIELDS: [&str; 8] = [
    "sentinel",
    "fauna",
    "flora",
    "properties",
    "materials",
    "base_location",
    "photo",
    "notes",
];

const AXES: [&str; 3] = ["x", "y", "z"];

/// Record layout of one import file.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceShape {
    /// System-like records, each with the map key it was stored under.
    Standard(Vec<(Option<String>, Value)>),
    /// Timestamped discovery entries.
    DiscoveryLog(Vec<Value>),
}

/// Classifies a parsed file. Returns `None` for scalar roots.
pub fn detect_shape(root: Value) -> Option<SourceShape> {
    match root {
        Value::Object(mut map) => {
            if matches!(map.get("discoveries"), Some(Value::Array(_))) {
                if let Some(Value::Array(entries)) = map.remove("discoveries") {
                    return Some(SourceShape::DiscoveryLog(entries));
                }
            }
            if matches!(map.get("systems"), Some(Value::Array(_))) {
                if let Some(Value::Array(records)) = map.remove("systems") {
                    return Some(SourceShape::Standard(
                        records.into_iter().map(|value| (None, value)).collect(),
                    ));
                }
            }
            Some(SourceShape::Standard(
                map.into_iter()
                    .filter(|(key, _)| key != META_KEY)
                    .map(|(key, value)| (Some(key), value))
                    .collect(),
            ))
        }
        Value::Array(items) => {
            if items.is_empty() || items.iter().any(has_coordinates) {
                Some(SourceShape::Standard(
                    items.into_iter().map(|value| (None, value)).collect(),
                ))
            } else {
                Some(SourceShape::DiscoveryLog(items))
            }
        }
        _ => None,
    }
}

fn has_coordinates(value: &Value) -> bool {
    value.as_object().is_some_and(|record| {
        record.contains_key("coordinates") || AXES.iter().any(|axis| record.contains_key(*axis))
    })
}

/// Converts one loosely typed record into a [`System`].
///
/// `key` is the map key the record was stored under, used when the record
/// has no usable `name`.
pub fn normalize_system(key: Option<&str>, value: Value) -> Result<System, ValidationError> {
    let Value::Object(mut record) = value else {
        return Err(ValidationError::new("record", "expected a JSON object"));
    };

    let name = match record.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ValidationError::new("name", "record has no name"))?,
    };
    record.insert("name".to_string(), Value::String(name.clone()));

    match record.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {
            record.insert("id".to_string(), Value::String(id.trim().to_string()));
        }
        Some(Value::Number(id)) => {
            record.insert("id".to_string(), Value::String(id.to_string()));
        }
        _ => {}
    }

    lift_nested_coordinates(&mut record);
    for axis in AXES {
        let value = record
            .get(axis)
            .ok_or_else(|| ValidationError::new(axis, "coordinate is missing"))?;
        let number =
            coerce_number(value).ok_or_else(|| ValidationError::new(axis, "expected a number"))?;
        record.insert(axis.to_string(), Value::from(number));
    }

    match record.get("region") {
        Some(Value::Null) => {
            record.remove("region");
        }
        Some(value) if !value.is_string() => {
            let text = text_of(value);
            record.insert("region".to_string(), Value::String(text));
        }
        _ => {}
    }

    for field in SYSTEM_TEXT_FIELDS {
        coerce_text(&mut record, field);
    }

    let planets = record.remove("planets").unwrap_or(Value::Null);
    record.insert("planets".to_string(), normalize_planets(planets)?);

    match record.remove("space_station") {
        None | Some(Value::Null) => {}
        Some(station) => {
            let station = normalize_station(&name, station)?;
            record.insert("space_station".to_string(), station);
        }
    }

    serde_json::from_value(Value::Object(record))
        .map_err(|err| ValidationError::new("record", err.to_string()))
}

/// Copies `coordinates` (`{x,y,z}` or `[x,y,z]`) to top-level axes that are
/// missing.
fn lift_nested_coordinates(record: &mut Map<String, Value>) {
    let Some(nested) = record.remove("coordinates") else {
        return;
    };
    let values: Vec<Option<Value>> = match nested {
        Value::Object(mut axes) => AXES.iter().map(|axis| axes.remove(*axis)).collect(),
        Value::Array(items) => {
            let mut items = items.into_iter();
            AXES.iter().map(|_| items.next()).collect()
        }
        _ => return,
    };
    for (axis, value) in AXES.iter().zip(values) {
        if let Some(value) = value {
            record.entry(axis.to_string()).or_insert(value);
        }
    }
}

fn normalize_planets(value: Value) -> Result<Value, ValidationError> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Object(map) => map.into_iter().map(|(key, item)| (Some(key), item)).collect(),
        _ => return Err(ValidationError::new("planets", "expected a list")),
    };

    let mut planets = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        let mut planet = match entry {
            Value::String(name) => to_value(&Planet::placeholder(name.trim()))?,
            Value::Object(record) => Value::Object(record),
            _ => return Err(ValidationError::new("planets", "expected a name or object")),
        };
        if let Value::Object(record) = &mut planet {
            fill_name(record, key.as_deref(), "planets")?;
            for field in BODY_TEXT_FIELDS {
                coerce_text(record, field);
            }
            let moons = record.remove("moons").unwrap_or(Value::Null);
            record.insert("moons".to_string(), normalize_moons(moons)?);
        }
        planets.push(planet);
    }
    Ok(Value::Array(planets))
}

fn normalize_moons(value: Value) -> Result<Value, ValidationError> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Object(map) => map.into_iter().map(|(key, item)| (Some(key), item)).collect(),
        _ => return Err(ValidationError::new("moons", "expected a list")),
    };

    let mut moons = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        let mut moon = match entry {
            Value::String(name) => to_value(&Moon::placeholder(name.trim()))?,
            Value::Object(record) => Value::Object(record),
            _ => return Err(ValidationError::new("moons", "expected a name or object")),
        };
        if let Value::Object(record) = &mut moon {
            fill_name(record, key.as_deref(), "moons")?;
            for field in BODY_TEXT_FIELDS {
                coerce_text(record, field);
            }
            for field in ["orbit_radius", "orbit_speed"] {
                coerce_optional_number(record, field)?;
            }
        }
        moons.push(moon);
    }
    Ok(Value::Array(moons))
}

fn normalize_station(system_name: &str, value: Value) -> Result<Value, ValidationError> {
    let mut record = match value {
        Value::String(name) => {
            let mut record = Map::new();
            record.insert("name".to_string(), Value::String(name));
            record
        }
        Value::Object(record) => record,
        _ => return Err(ValidationError::new("space_station", "expected an object")),
    };

    let has_name = matches!(record.get("name"), Some(Value::String(name)) if !name.trim().is_empty());
    if !has_name {
        record.insert(
            "name".to_string(),
            Value::String(format!("{system_name} Station")),
        );
    }
    for axis in AXES {
        coerce_optional_number(&mut record, axis)?;
    }
    for field in ["sell_percent", "buy_percent"] {
        if let Some(value) = record.get(field) {
            if value.is_null() {
                record.remove(field);
                continue;
            }
            let number = coerce_number(value)
                .ok_or_else(|| ValidationError::new(field, "expected a number"))?;
            record.insert(field.to_string(), Value::from(number.round() as i64));
        }
    }
    if let Some(race) = record.get("race") {
        if race.is_null() {
            record.remove("race");
        } else if !race.is_string() {
            let text = text_of(race);
            record.insert("race".to_string(), Value::String(text));
        }
    }
    Ok(Value::Object(record))
}

fn fill_name(
    record: &mut Map<String, Value>,
    key: Option<&str>,
    field: &str,
) -> Result<(), ValidationError> {
    let has_name = matches!(record.get("name"), Some(Value::String(name)) if !name.trim().is_empty());
    if has_name {
        return Ok(());
    }
    let name = key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ValidationError::new(field, "entry has no name"))?;
    record.insert("name".to_string(), Value::String(name.trim().to_string()));
    Ok(())
}

fn coerce_optional_number(
    record: &mut Map<String, Value>,
    field: &str,
) -> Result<(), ValidationError> {
    let Some(value) = record.get(field) else {
        return Ok(());
    };
    if value.is_null() {
        record.remove(field);
        return Ok(());
    }
    let number = coerce_number(value).ok_or_else(|| ValidationError::new(field, "expected a number"))?;
    record.insert(field.to_string(), Value::from(number));
    Ok(())
}

/// Accepts JSON numbers and numeric strings; rejects non-finite values.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Rewrites `field` as text: lists/objects become JSON, scalars their
/// display form, `null` removes the key.
fn coerce_text(record: &mut Map<String, Value>, field: &str) {
    match record.get(field) {
        None | Some(Value::String(_)) => {}
        Some(Value::Null) => {
            record.remove(field);
        }
        Some(value) => {
            let text = text_of(value);
            record.insert(field.to_string(), Value::String(text));
        }
    }
}

pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ValidationError> {
    serde_json::to_value(value).map_err(|err| ValidationError::new("record", err.to_string()))
}
