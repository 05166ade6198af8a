//! Troop unit types and counts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Spear,
    Sword,
    Axe,
    Archer,
    Spy,
    Light,
    Marcher,
    Heavy,
    Ram,
    Catapult,
    Knight,
    Snob,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Spear => "spear",
            UnitType::Sword => "sword",
            UnitType::Axe => "axe",
            UnitType::Archer => "archer",
            UnitType::Spy => "spy",
            UnitType::Light => "light",
            UnitType::Marcher => "marcher",
            UnitType::Heavy => "heavy",
            UnitType::Ram => "ram",
            UnitType::Catapult => "catapult",
            UnitType::Knight => "knight",
            UnitType::Snob => "snob",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const BARRACKS_UNITS: [UnitType; 4] =
    [UnitType::Spear, UnitType::Sword, UnitType::Axe, UnitType::Archer];
pub const STABLE_UNITS: [UnitType; 4] =
    [UnitType::Spy, UnitType::Light, UnitType::Marcher, UnitType::Heavy];
pub const WORKSHOP_UNITS: [UnitType; 2] = [UnitType::Ram, UnitType::Catapult];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TroopCounts {
    pub counts: HashMap<String, i64>,
}

impl TroopCounts {
    pub fn get(&self, unit: &str) -> i64 {
        *self.counts.get(unit).unwrap_or(&0)
    }

    pub fn set(&mut self, unit: &str, count: i64) {
        self.counts.insert(unit.to_string(), count);
    }

    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }

    pub fn has_enough(&self, required: &HashMap<String, i64>) -> bool {
        required.iter().all(|(unit, count)| self.get(unit) >= *count)
    }

    pub fn subtract(&self, other: &HashMap<String, i64>) -> TroopCounts {
        let mut new_counts = self.counts.clone();
        for (unit, count) in other {
            let entry = new_counts.entry(unit.clone()).or_insert(0);
            *entry = (*entry - count).max(0);
        }
        TroopCounts { counts: new_counts }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainQueue {
    pub unit: String,
    pub count: i64,
    pub finish_time: Option<DateTime<Utc>>,
}
