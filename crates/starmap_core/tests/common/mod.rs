#![allow(dead_code)]

use starmap_core::{
    EngineConfig, FlatFileRepository, Moon, Planet, SpaceStation, SqliteSystemRepository, System,
    SystemRepository,
};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Flat,
    Relational,
}

pub fn config_in(dir: &TempDir) -> EngineConfig {
    let mut config = EngineConfig::with_data_dir(dir.path());
    config.lock.timeout_ms = 2_000;
    config.lock.poll_interval_ms = 10;
    config
}

pub fn open_store(backend: Backend, config: &EngineConfig) -> Box<dyn SystemRepository> {
    match backend {
        Backend::Flat => Box::new(FlatFileRepository::from_config(config)),
        Backend::Relational => Box::new(SqliteSystemRepository::from_config(config)),
    }
}

/// System with a planet (one moon), a placeholder planet and a station.
pub fn sample_system(name: &str) -> System {
    let mut system = System::new(name, "Euclid", 10.0, -20.0, 30.0);
    system.fauna = Some("Abundant".to_string());
    system.materials = Some("Copper, Gold".to_string());
    system.attributes = Some("ancient ruins".to_string());

    let mut planet = Planet::new("Lush World");
    planet.sentinel = Some("Low".to_string());
    planet.notes = Some("good base site".to_string());
    let mut moon = Moon::new("Pebble");
    moon.orbit_radius = 0.8;
    planet.moons.push(moon);

    system.planets.push(planet);
    system.planets.push(Planet::placeholder("Barren"));
    system.space_station = Some(SpaceStation::new("Trade Hub", 1.0, 2.0, 3.0));
    system
}

pub fn bare_system(name: &str, region: &str, x: f64) -> System {
    System::new(name, region, x, 0.0, 0.0)
}
