//! Index-addressed entity tree shared by both backends during sync.
//!
//! # Responsibility
//! - Flatten nested System→Planet→Moon records into typed vectors.
//! - Keep parent references so any child can be traced back to its system.
//! - Recompose nested `System` records on demand.
//!
//! # Invariants
//! - Indices are stable for the lifetime of one arena.
//! - Every planet/moon/station node references an existing parent.
//! - System names are unique within one arena.

use crate::model::system::{Moon, Planet, SpaceStation, System, SystemId};
use std::collections::{BTreeMap, HashMap};

/// Position of a system node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemIndex(usize);

/// Position of a planet node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanetIndex(usize);

/// Position of a moon node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoonIndex(usize);

/// Position of a station node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationIndex(usize);

#[derive(Debug, Clone)]
struct SystemNode {
    /// Record with `planets` and `space_station` detached.
    record: System,
    planets: Vec<PlanetIndex>,
    station: Option<StationIndex>,
}

#[derive(Debug, Clone)]
struct PlanetNode {
    parent: SystemIndex,
    /// Record with `moons` detached.
    record: Planet,
    moons: Vec<MoonIndex>,
}

#[derive(Debug, Clone)]
struct MoonNode {
    parent: PlanetIndex,
    record: Moon,
}

#[derive(Debug, Clone)]
struct StationNode {
    parent: SystemIndex,
    record: SpaceStation,
}

/// Flat arena of systems and their owned children.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    systems: Vec<SystemNode>,
    planets: Vec<PlanetNode>,
    moons: Vec<MoonNode>,
    stations: Vec<StationNode>,
    by_name: BTreeMap<String, SystemIndex>,
    by_id: HashMap<SystemId, SystemIndex>,
}

/// Entity totals held by an arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaCounts {
    pub systems: usize,
    pub planets: usize,
    pub moons: usize,
    pub stations: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an arena from nested records.
    ///
    /// Later records with an already-seen name are ignored and returned so
    /// the caller can report them.
    pub fn from_systems(systems: impl IntoIterator<Item = System>) -> (Self, Vec<System>) {
        let mut arena = Self::new();
        let mut rejected = Vec::new();
        for system in systems {
            if let Err(system) = arena.insert(system) {
                rejected.push(*system);
            }
        }
        (arena, rejected)
    }

    /// Inserts one nested system, splitting it into nodes.
    ///
    /// Returns the system back when its name is already present.
    pub fn insert(&mut self, mut system: System) -> Result<SystemIndex, Box<System>> {
        if self.by_name.contains_key(&system.name) {
            return Err(Box::new(system));
        }

        let index = SystemIndex(self.systems.len());
        let planets = std::mem::take(&mut system.planets);
        let station = system.space_station.take();

        let mut planet_indices = Vec::with_capacity(planets.len());
        for mut planet in planets {
            let planet_index = PlanetIndex(self.planets.len());
            let moons = std::mem::take(&mut planet.moons);
            let mut moon_indices = Vec::with_capacity(moons.len());
            for moon in moons {
                moon_indices.push(MoonIndex(self.moons.len()));
                self.moons.push(MoonNode {
                    parent: planet_index,
                    record: moon,
                });
            }
            self.planets.push(PlanetNode {
                parent: index,
                record: planet,
                moons: moon_indices,
            });
            planet_indices.push(planet_index);
        }

        let station_index = station.map(|record| {
            let station_index = StationIndex(self.stations.len());
            self.stations.push(StationNode {
                parent: index,
                record,
            });
            station_index
        });

        self.by_name.insert(system.name.clone(), index);
        if let Some(id) = system.id.clone() {
            self.by_id.insert(id, index);
        }
        self.systems.push(SystemNode {
            record: system,
            planets: planet_indices,
            station: station_index,
        });

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn counts(&self) -> ArenaCounts {
        ArenaCounts {
            systems: self.systems.len(),
            planets: self.planets.len(),
            moons: self.moons.len(),
            stations: self.stations.len(),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<SystemIndex> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_id(&self, id: &str) -> Option<SystemIndex> {
        self.by_id.get(id).copied()
    }

    /// Returns system indices ordered by system name.
    pub fn indices_by_name(&self) -> impl Iterator<Item = SystemIndex> + '_ {
        self.by_name.values().copied()
    }

    /// Returns the system fields without its children.
    pub fn system(&self, index: SystemIndex) -> &System {
        &self.systems[index.0].record
    }

    pub fn planets_of(&self, index: SystemIndex) -> &[PlanetIndex] {
        &self.systems[index.0].planets
    }

    pub fn planet(&self, index: PlanetIndex) -> &Planet {
        &self.planets[index.0].record
    }

    pub fn planet_parent(&self, index: PlanetIndex) -> SystemIndex {
        self.planets[index.0].parent
    }

    pub fn moons_of(&self, index: PlanetIndex) -> &[MoonIndex] {
        &self.planets[index.0].moons
    }

    pub fn moon(&self, index: MoonIndex) -> &Moon {
        &self.moons[index.0].record
    }

    pub fn moon_parent(&self, index: MoonIndex) -> PlanetIndex {
        self.moons[index.0].parent
    }

    pub fn station_parent(&self, index: StationIndex) -> SystemIndex {
        self.stations[index.0].parent
    }

    pub fn station_of(&self, index: SystemIndex) -> Option<StationIndex> {
        self.systems[index.0].station
    }

    /// Rebuilds the nested record for one system.
    pub fn compose(&self, index: SystemIndex) -> System {
        let node = &self.systems[index.0];
        let mut system = node.record.clone();
        system.planets = node
            .planets
            .iter()
            .map(|planet_index| {
                let planet_node = &self.planets[planet_index.0];
                let mut planet = planet_node.record.clone();
                planet.moons = planet_node
                    .moons
                    .iter()
                    .map(|moon_index| self.moons[moon_index.0].record.clone())
                    .collect();
                planet
            })
            .collect();
        system.space_station = node
            .station
            .map(|station_index| self.stations[station_index.0].record.clone());
        system
    }
}

#[cfg(test)]
mod tests {
    use super::EntityArena;
    use crate::model::system::{Moon, Planet, SpaceStation, System};

    fn sample_system(name: &str) -> System {
        let mut system = System::new(name, "R1", 1.0, 2.0, 3.0);
        system.id = Some(format!("id-{name}"));
        let mut planet = Planet::new(format!("{name} I"));
        planet.moons.push(Moon::new(format!("{name} I a")));
        planet.moons.push(Moon::new(format!("{name} I b")));
        system.planets.push(planet);
        system.planets.push(Planet::new(format!("{name} II")));
        system.space_station = Some(SpaceStation::new("Dock", 1.0, 1.0, 1.0));
        system
    }

    #[test]
    fn compose_restores_nested_record() {
        let original = sample_system("Alpha");
        let (arena, rejected) = EntityArena::from_systems([original.clone()]);
        assert!(rejected.is_empty());

        let index = arena.find_by_name("Alpha").unwrap();
        assert_eq!(arena.compose(index), original);
        assert_eq!(arena.find_by_id("id-Alpha"), Some(index));
    }

    #[test]
    fn children_reference_their_parents() {
        let (arena, _) = EntityArena::from_systems([sample_system("Alpha"), sample_system("Beta")]);
        let beta = arena.find_by_name("Beta").unwrap();

        let first_planet = arena.planets_of(beta)[0];
        assert_eq!(arena.planet_parent(first_planet), beta);
        assert_eq!(arena.planet(first_planet).name, "Beta I");

        let moon = arena.moons_of(first_planet)[1];
        assert_eq!(arena.moon_parent(moon), first_planet);
        assert_eq!(arena.moon(moon).name, "Beta I b");

        let station = arena.station_of(beta).unwrap();
        assert_eq!(arena.station_parent(station), beta);

        let counts = arena.counts();
        assert_eq!(counts.systems, 2);
        assert_eq!(counts.planets, 4);
        assert_eq!(counts.moons, 4);
        assert_eq!(counts.stations, 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (arena, rejected) =
            EntityArena::from_systems([sample_system("Alpha"), sample_system("Alpha")]);
        assert_eq!(arena.len(), 1);
        assert_eq!(rejected.len(), 1);
    }
}
