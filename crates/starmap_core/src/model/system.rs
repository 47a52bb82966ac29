//! System/Planet/Moon/SpaceStation domain model.
//!
//! # Responsibility
//! - Define the canonical records shared by both storage backends.
//! - Provide the partial-update shape used by `update` operations.
//!
//! # Invariants
//! - A `System` exclusively owns its planets and at most one station.
//! - A `Planet` exclusively owns its moons.
//! - Optional descriptive fields serialize only when present, so flat-file
//!   round trips do not invent empty keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a System within one store.
///
/// Kept as a plain string because imported data may carry legacy ids that
/// are not UUIDs.
pub type SystemId = String;

const DEFAULT_ORBIT_RADIUS: f64 = 0.5;
const DEFAULT_ORBIT_SPEED: f64 = 0.05;
const DEFAULT_STATION_RACE: &str = "Gek";
const DEFAULT_SELL_PERCENT: i64 = 80;
const DEFAULT_BUY_PERCENT: i64 = 50;

/// Placeholder used when imported data names an entity but omits details.
pub const UNKNOWN_PLACEHOLDER: &str = "Unknown";

/// Star system record, the root of the owned hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    /// Store-unique id. `None` until assigned by `add`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SystemId>,
    pub name: String,
    /// Grouping label used by region filters.
    #[serde(default)]
    pub region: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fauna: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flora: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Freeform attribute text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    #[serde(default)]
    pub planets: Vec<Planet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_station: Option<SpaceStation>,
}

impl System {
    /// Creates a system at the given coordinates with no optional details.
    pub fn new(name: impl Into<String>, region: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            region: region.into(),
            x,
            y,
            z,
            fauna: None,
            flora: None,
            sentinel: None,
            materials: None,
            base_location: None,
            photo: None,
            attributes: None,
            planets: Vec::new(),
            space_station: None,
        }
    }

    /// Returns the id, generating a fresh one when none is set.
    pub fn id_or_generate(&self) -> SystemId {
        self.id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Applies a partial update, keeping fields the patch leaves unset.
    ///
    /// `planets` and `space_station` are replaced wholesale when present.
    pub fn apply_patch(&mut self, patch: &SystemPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(region) = &patch.region {
            self.region = region.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(z) = patch.z {
            self.z = z;
        }
        merge_optional(&mut self.fauna, &patch.fauna);
        merge_optional(&mut self.flora, &patch.flora);
        merge_optional(&mut self.sentinel, &patch.sentinel);
        merge_optional(&mut self.materials, &patch.materials);
        merge_optional(&mut self.base_location, &patch.base_location);
        merge_optional(&mut self.photo, &patch.photo);
        merge_optional(&mut self.attributes, &patch.attributes);
        if let Some(planets) = &patch.planets {
            self.planets = planets.clone();
        }
        if let Some(station) = &patch.space_station {
            self.space_station = station.clone();
        }
    }
}

fn merge_optional(target: &mut Option<String>, value: &Option<Option<String>>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

/// Planet owned by exactly one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fauna: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flora: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub moons: Vec<Moon>,
}

impl Planet {
    /// Creates a planet with only its name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sentinel: None,
            fauna: None,
            flora: None,
            properties: None,
            materials: None,
            base_location: None,
            photo: None,
            notes: None,
            moons: Vec::new(),
        }
    }

    /// Creates a planet from a bare name, filling descriptive fields with
    /// the `Unknown` placeholder.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            sentinel: Some(UNKNOWN_PLACEHOLDER.to_string()),
            fauna: Some(UNKNOWN_PLACEHOLDER.to_string()),
            flora: Some(UNKNOWN_PLACEHOLDER.to_string()),
            properties: Some(UNKNOWN_PLACEHOLDER.to_string()),
            materials: Some(UNKNOWN_PLACEHOLDER.to_string()),
            ..Self::new(name)
        }
    }
}

/// Moon owned by exactly one planet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moon {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fauna: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flora: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_orbit_radius")]
    pub orbit_radius: f64,
    #[serde(default = "default_orbit_speed")]
    pub orbit_speed: f64,
}

impl Moon {
    /// Creates a moon with default orbit parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sentinel: None,
            fauna: None,
            flora: None,
            properties: None,
            materials: None,
            base_location: None,
            photo: None,
            notes: None,
            orbit_radius: DEFAULT_ORBIT_RADIUS,
            orbit_speed: DEFAULT_ORBIT_SPEED,
        }
    }

    /// Creates a moon from a bare name with `Unknown` placeholders.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            sentinel: Some(UNKNOWN_PLACEHOLDER.to_string()),
            fauna: Some(UNKNOWN_PLACEHOLDER.to_string()),
            flora: Some(UNKNOWN_PLACEHOLDER.to_string()),
            ..Self::new(name)
        }
    }
}

/// Trading station; at most one per system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceStation {
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_station_race")]
    pub race: String,
    #[serde(default = "default_sell_percent")]
    pub sell_percent: i64,
    #[serde(default = "default_buy_percent")]
    pub buy_percent: i64,
}

impl SpaceStation {
    /// Creates a station with default race and trade percentages.
    pub fn new(name: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            z,
            race: default_station_race(),
            sell_percent: DEFAULT_SELL_PERCENT,
            buy_percent: DEFAULT_BUY_PERCENT,
        }
    }
}

/// Partial update for a system.
///
/// Outer `None` keeps the stored value. For optional descriptive fields,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemPatch {
    pub name: Option<String>,
    pub region: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub fauna: Option<Option<String>>,
    pub flora: Option<Option<String>>,
    pub sentinel: Option<Option<String>>,
    pub materials: Option<Option<String>>,
    pub base_location: Option<Option<String>>,
    pub photo: Option<Option<String>>,
    pub attributes: Option<Option<String>>,
    pub planets: Option<Vec<Planet>>,
    pub space_station: Option<Option<SpaceStation>>,
}

impl SystemPatch {
    /// Builds a patch that replaces every field with the values of `system`.
    ///
    /// The id is never part of a patch.
    pub fn replace_with(system: &System) -> Self {
        Self {
            name: Some(system.name.clone()),
            region: Some(system.region.clone()),
            x: Some(system.x),
            y: Some(system.y),
            z: Some(system.z),
            fauna: Some(system.fauna.clone()),
            flora: Some(system.flora.clone()),
            sentinel: Some(system.sentinel.clone()),
            materials: Some(system.materials.clone()),
            base_location: Some(system.base_location.clone()),
            photo: Some(system.photo.clone()),
            attributes: Some(system.attributes.clone()),
            planets: Some(system.planets.clone()),
            space_station: Some(system.space_station.clone()),
        }
    }

    /// Returns whether this patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn default_orbit_radius() -> f64 {
    DEFAULT_ORBIT_RADIUS
}

fn default_orbit_speed() -> f64 {
    DEFAULT_ORBIT_SPEED
}

fn default_station_race() -> String {
    DEFAULT_STATION_RACE.to_string()
}

fn default_sell_percent() -> i64 {
    DEFAULT_SELL_PERCENT
}

fn default_buy_percent() -> i64 {
    DEFAULT_BUY_PERCENT
}

#[cfg(test)]
mod tests {
    use super::{Moon, Planet, System, SystemPatch};

    #[test]
    fn apply_patch_keeps_unset_fields() {
        let mut system = System::new("Alpha", "R1", 1.0, 2.0, 3.0);
        system.fauna = Some("Rich".to_string());

        let patch = SystemPatch {
            region: Some("R2".to_string()),
            x: Some(9.0),
            ..SystemPatch::default()
        };
        system.apply_patch(&patch);

        assert_eq!(system.region, "R2");
        assert_eq!(system.x, 9.0);
        assert_eq!(system.y, 2.0);
        assert_eq!(system.fauna.as_deref(), Some("Rich"));
    }

    #[test]
    fn apply_patch_can_clear_optional_field() {
        let mut system = System::new("Alpha", "R1", 1.0, 2.0, 3.0);
        system.photo = Some("alpha.png".to_string());

        let patch = SystemPatch {
            photo: Some(None),
            ..SystemPatch::default()
        };
        system.apply_patch(&patch);

        assert_eq!(system.photo, None);
    }

    #[test]
    fn moon_defaults_apply_when_orbit_fields_are_missing() {
        let moon: Moon = serde_json::from_str(r#"{"name":"Io"}"#).unwrap();
        assert_eq!(moon, Moon::new("Io"));
    }

    #[test]
    fn system_json_omits_absent_optional_fields() {
        let mut system = System::new("Alpha", "R1", 1.0, 2.0, 3.0);
        system.planets.push(Planet::new("Prime"));

        let json = serde_json::to_value(&system).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("fauna").is_none());
        assert!(json.get("space_station").is_none());
        assert_eq!(json["planets"][0]["name"], "Prime");
    }
}
