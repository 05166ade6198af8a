//! Village state and resource bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Resources {
    pub wood: i64,
    pub stone: i64,
    pub iron: i64,
}

impl Resources {
    pub fn new(wood: i64, stone: i64, iron: i64) -> Self {
        Self { wood, stone, iron }
    }

    pub fn total(&self) -> i64 {
        self.wood + self.stone + self.iron
    }

    pub fn can_afford(&self, cost: &Resources) -> bool {
        self.wood >= cost.wood && self.stone >= cost.stone && self.iron >= cost.iron
    }
}

impl std::ops::Sub for Resources {
    type Output = Resources;
    fn sub(self, other: Resources) -> Resources {
        Resources {
            wood: self.wood - other.wood,
            stone: self.stone - other.stone,
            iron: self.iron - other.iron,
        }
    }
}

impl std::ops::Add for Resources {
    type Output = Resources;
    fn add(self, other: Resources) -> Resources {
        Resources {
            wood: self.wood + other.wood,
            stone: self.stone + other.stone,
            iron: self.iron + other.iron,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Village {
    pub id: u64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub points: i64,
    pub resources: Resources,
    pub storage: i64,
    pub population: i64,
    pub max_population: i64,
    /// Per-hour production rates.
    pub production: Resources,
    /// Building internal name -> level.
    pub buildings: HashMap<String, i32>,
    pub incoming_attacks: i64,
    pub last_updated: Option<DateTime<Utc>>,
    /// Whether the account's premium account grants a second build-queue
    /// slot (`game_data.features.Premium.active` in the page's JS state).
    pub premium: bool,
}

impl Village {
    pub fn distance_to(&self, x: i32, y: i32) -> f64 {
        (((self.x - x).pow(2) + (self.y - y).pow(2)) as f64).sqrt()
    }
}
