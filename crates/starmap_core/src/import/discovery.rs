//! Mapping of discovery-log entries onto [`Discovery`].

use crate::import::records::text_of;
use crate::model::discovery::{Discovery, DEFAULT_DISCOVERY_TYPE};
use serde_json::{Map, Value};

const SYSTEM_KEYS: &[&str] = &["system", "system_name", "location"];
const PLANET_KEYS: &[&str] = &["planet", "planet_name"];
const MOON_KEYS: &[&str] = &["moon", "moon_name"];
const NAME_KEYS: &[&str] = &["name", "title", "discovery_name"];
const TYPE_KEYS: &[&str] = &["type", "discovery_type"];
const DESCRIPTION_KEYS: &[&str] = &["description", "notes", "details"];
const AUTHOR_KEYS: &[&str] = &["user", "discovered_by", "author"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "date", "discovered_at"];
const EVIDENCE_KEYS: &[&str] = &["evidence", "photos", "photo", "images"];

/// Maps one entry. Returns `None` when the entry is not a JSON object.
pub fn normalize_discovery(value: Value) -> Option<Discovery> {
    let Value::Object(mut entry) = value else {
        return None;
    };

    let system_name = take_text(&mut entry, SYSTEM_KEYS);
    let planet_name = take_text(&mut entry, PLANET_KEYS);
    let moon_name = take_text(&mut entry, MOON_KEYS);
    let discovery_name = take_text(&mut entry, NAME_KEYS);
    let discovery_type =
        take_text(&mut entry, TYPE_KEYS).unwrap_or_else(|| DEFAULT_DISCOVERY_TYPE.to_string());
    let description = take_text(&mut entry, DESCRIPTION_KEYS).unwrap_or_default();
    let discovered_by = take_text(&mut entry, AUTHOR_KEYS);
    let discovered_at = take_text(&mut entry, TIMESTAMP_KEYS);
    let evidence = take_text(&mut entry, EVIDENCE_KEYS);

    entry.retain(|_, value| !value.is_null());
    let extra = (!entry.is_empty()).then(|| Value::Object(entry).to_string());

    Some(Discovery {
        system_name,
        planet_name,
        moon_name,
        discovery_name,
        discovery_type,
        description,
        discovered_by,
        discovered_at,
        evidence,
        extra,
    })
}

/// Removes every alias in `keys` and returns the first non-blank value.
fn take_text(entry: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        let Some(value) = entry.remove(*key) else {
            continue;
        };
        if found.is_some() || value.is_null() {
            continue;
        }
        let text = text_of(&value);
        if !text.trim().is_empty() {
            found = Some(text.trim().to_string());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::normalize_discovery;
    use serde_json::json;

    #[test]
    fn aliases_and_defaults_apply() {
        let discovery = normalize_discovery(json!({
            "location": "Alpha",
            "planet_name": "Lush",
            "title": "Glowing Moss",
            "author": "traveller",
            "date": "2024-05-01",
            "photos": ["a.png", "b.png"],
            "mood": "excited"
        }))
        .unwrap();

        assert_eq!(discovery.system_name.as_deref(), Some("Alpha"));
        assert_eq!(discovery.planet_name.as_deref(), Some("Lush"));
        assert_eq!(discovery.discovery_name.as_deref(), Some("Glowing Moss"));
        assert_eq!(discovery.discovery_type, "Unknown");
        assert_eq!(discovery.description, "");
        assert_eq!(discovery.evidence.as_deref(), Some(r#"["a.png","b.png"]"#));
        assert_eq!(discovery.extra.as_deref(), Some(r#"{"mood":"excited"}"#));
        assert!(discovery.has_identity());
    }

    #[test]
    fn entry_without_references_has_no_identity() {
        let discovery = normalize_discovery(json!({"type": "Flora", "notes": "pretty"})).unwrap();
        assert!(!discovery.has_identity());
        assert!(normalize_discovery(json!(7)).is_none());
    }
}
