//! World-level game parameters, read once at startup and treated as
//! immutable thereafter (see [`crate::config::world`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::village::Resources;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitInfo {
    pub name: String,
    pub pop: i32,
    pub speed: f64,
    pub attack: i64,
    pub defense: i64,
    pub defense_cavalry: i64,
    pub defense_archer: i64,
    pub carry: i64,
    pub cost: Resources,
    pub build_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingInfo {
    pub name: String,
    pub max_level: i32,
    pub min_level: i32,
    pub wood_factor: f64,
    pub stone_factor: f64,
    pub iron_factor: f64,
    pub pop_factor: f64,
    pub build_time_factor: f64,
}

/// World parameters as fetched once from the game's config endpoint.
///
/// Carry capacities are what [`crate::scavenge::formulas`] uses for duration
/// and loot math; they are looked up by unit name, falling back to `0` for
/// units the world config didn't report (matching the source's defaulted
/// `unit_carries` dict).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub speed: f64,
    pub unit_speed: f64,
    pub max_build_queue: i32,
    pub units: HashMap<String, UnitInfo>,
    pub buildings: HashMap<String, BuildingInfo>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            unit_speed: 1.0,
            max_build_queue: 2,
            units: HashMap::new(),
            buildings: HashMap::new(),
        }
    }
}

impl WorldConfig {
    pub fn carry_for(&self, unit: &str) -> i64 {
        self.units.get(unit).map(|u| u.carry).unwrap_or(0)
    }
}
