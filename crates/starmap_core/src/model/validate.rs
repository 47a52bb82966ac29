//! Validation rules for system payloads.
//!
//! # Responsibility
//! - Reject malformed systems before any store mutation.
//! - Expose a coordinate-only check for lightweight callers.
//!
//! # Invariants
//! - Validation never mutates its input.
//! - Errors carry a field path (`planets[0].moons[1].name`) and a message.
//! - Boundary coordinate values are valid.

use crate::model::system::{Moon, Planet, SpaceStation, System};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Absolute bound for the horizontal `x` and `y` axes.
pub const HORIZONTAL_BOUND: f64 = 100.0;
/// Absolute bound for the vertical `z` axis.
pub const VERTICAL_BOUND: f64 = 250.0;
/// Maximum number of characters in a system name.
pub const MAX_NAME_CHARS: usize = 100;

const UNSAFE_NAME_CHARS: &[char] = &['<', '>', '"', '\\', '|', '?', '*'];
const SENTINEL_LEVELS: &[&str] = &["none", "low", "medium", "high", "aggressive", "unknown"];
const MAX_TRADE_PERCENT: i64 = 100;

/// Validation failure with the offending field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Validates a full system record including nested planets, moons and
/// station.
pub fn validate_system(system: &System) -> Result<(), ValidationError> {
    validate_name(&system.name, "name")?;
    validate_axis(system.x, "x", HORIZONTAL_BOUND)?;
    validate_axis(system.y, "y", HORIZONTAL_BOUND)?;
    validate_axis(system.z, "z", VERTICAL_BOUND)?;

    let mut planet_names = HashSet::new();
    for (index, planet) in system.planets.iter().enumerate() {
        let path = format!("planets[{index}]");
        validate_planet(planet, &path)?;
        if !planet_names.insert(planet.name.trim()) {
            return Err(ValidationError::new(
                format!("{path}.name"),
                format!("duplicate planet name `{}` in system", planet.name),
            ));
        }
    }

    if let Some(station) = &system.space_station {
        validate_station(station)?;
    }

    Ok(())
}

/// Validates a coordinate triple against the fixed domain bounds.
///
/// Intended for live form feedback where a full system is not available.
pub fn validate_coordinates(x: f64, y: f64, z: f64) -> Result<(), ValidationError> {
    validate_axis(x, "x", HORIZONTAL_BOUND)?;
    validate_axis(y, "y", HORIZONTAL_BOUND)?;
    validate_axis(z, "z", VERTICAL_BOUND)?;
    Ok(())
}

fn validate_axis(value: f64, field: &str, bound: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "coordinate must be a finite number"));
    }
    if value < -bound || value > bound {
        return Err(ValidationError::new(
            field,
            format!("coordinate {value} is outside [-{bound}, {bound}]"),
        ));
    }
    Ok(())
}

fn validate_name(name: &str, field: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::new(
            field,
            format!("name exceeds {MAX_NAME_CHARS} characters"),
        ));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|ch| UNSAFE_NAME_CHARS.contains(ch) || ch.is_control())
    {
        return Err(ValidationError::new(
            field,
            format!("name contains unsupported character {bad:?}"),
        ));
    }
    Ok(())
}

fn validate_planet(planet: &Planet, path: &str) -> Result<(), ValidationError> {
    if planet.name.trim().is_empty() {
        return Err(ValidationError::new(
            format!("{path}.name"),
            "planet name cannot be empty",
        ));
    }

    if let Some(sentinel) = planet.sentinel.as_deref() {
        if !is_known_sentinel(sentinel) {
            return Err(ValidationError::new(
                format!("{path}.sentinel"),
                format!(
                    "unknown sentinel level `{sentinel}`; expected none|low|medium|high|aggressive|unknown"
                ),
            ));
        }
    }

    let mut moon_names = HashSet::new();
    for (index, moon) in planet.moons.iter().enumerate() {
        let moon_path = format!("{path}.moons[{index}]");
        validate_moon(moon, &moon_path)?;
        if !moon_names.insert(moon.name.trim()) {
            return Err(ValidationError::new(
                format!("{moon_path}.name"),
                format!("duplicate moon name `{}` in planet", moon.name),
            ));
        }
    }

    Ok(())
}

fn validate_moon(moon: &Moon, path: &str) -> Result<(), ValidationError> {
    if moon.name.trim().is_empty() {
        return Err(ValidationError::new(
            format!("{path}.name"),
            "moon name cannot be empty",
        ));
    }
    if !moon.orbit_radius.is_finite() || !moon.orbit_speed.is_finite() {
        return Err(ValidationError::new(
            format!("{path}.orbit_radius"),
            "orbit parameters must be finite numbers",
        ));
    }
    Ok(())
}

fn validate_station(station: &SpaceStation) -> Result<(), ValidationError> {
    if station.name.trim().is_empty() {
        return Err(ValidationError::new(
            "space_station.name",
            "station name cannot be empty",
        ));
    }
    for (value, field) in [
        (station.x, "space_station.x"),
        (station.y, "space_station.y"),
        (station.z, "space_station.z"),
    ] {
        if !value.is_finite() {
            return Err(ValidationError::new(field, "coordinate must be a finite number"));
        }
    }
    for (value, field) in [
        (station.sell_percent, "space_station.sell_percent"),
        (station.buy_percent, "space_station.buy_percent"),
    ] {
        if !(0..=MAX_TRADE_PERCENT).contains(&value) {
            return Err(ValidationError::new(
                field,
                format!("trade percentage {value} is outside [0, {MAX_TRADE_PERCENT}]"),
            ));
        }
    }
    Ok(())
}

fn is_known_sentinel(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    SENTINEL_LEVELS.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::{is_known_sentinel, validate_name};

    #[test]
    fn sentinel_levels_match_case_insensitively() {
        assert!(is_known_sentinel("High"));
        assert!(is_known_sentinel(" aggressive "));
        assert!(!is_known_sentinel("Frenzied"));
    }

    #[test]
    fn name_rejects_control_characters() {
        let err = validate_name("Alpha\nBeta", "name").unwrap_err();
        assert_eq!(err.field, "name");
    }
}
