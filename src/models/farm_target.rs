//! Farm target intel tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::village::Resources;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmTarget {
    /// Village ID of the target.
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub points: i64,
    pub is_barbarian: bool,
    pub wall_level: i32,
    pub last_loot: Resources,
    pub has_troops: bool,
    pub blacklisted: bool,
    pub last_attacked: Option<DateTime<Utc>>,
    pub attack_count: u32,
}

impl Default for FarmTarget {
    fn default() -> Self {
        Self {
            id: 0,
            x: 0,
            y: 0,
            points: 0,
            is_barbarian: true,
            wall_level: 0,
            last_loot: Resources::default(),
            has_troops: false,
            blacklisted: false,
            last_attacked: None,
            attack_count: 0,
        }
    }
}

impl FarmTarget {
    pub fn distance_from(&self, x: i32, y: i32) -> f64 {
        (((self.x - x).pow(2) + (self.y - y).pow(2)) as f64).sqrt()
    }
}
