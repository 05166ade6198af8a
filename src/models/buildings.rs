//! Building catalogue, build steps, and queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::village::Resources;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub name: String,
    pub level: i32,
    pub max_level: i32,
    pub cost: Resources,
    pub build_time: i64,
}

impl Default for Building {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: 0,
            max_level: 30,
            cost: Resources::default(),
            build_time: 0,
        }
    }
}

/// A single step in a sequential build order template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStep {
    pub building: String,
    pub level: i32,
}

/// An entry in the live building queue as reported by the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildQueueEntry {
    pub building: String,
    pub target_level: i32,
    pub finish_time: Option<DateTime<Utc>>,
}

/// Building internal names, in the order the game lists them.
pub const BUILDING_NAMES: [&str; 17] = [
    "main", "barracks", "stable", "garage", "watchtower", "snob", "smith", "place",
    "statue", "market", "wood", "stone", "iron", "farm", "storage", "hide", "wall",
];

pub fn building_label(name: &str) -> &'static str {
    match name {
        "main" => "Headquarters",
        "barracks" => "Barracks",
        "stable" => "Stable",
        "garage" => "Workshop",
        "watchtower" => "Watchtower",
        "snob" => "Academy",
        "smith" => "Smithy",
        "place" => "Rally Point",
        "statue" => "Statue",
        "market" => "Market",
        "wood" => "Timber Camp",
        "stone" => "Clay Pit",
        "iron" => "Iron Mine",
        "farm" => "Farm",
        "storage" => "Warehouse",
        "hide" => "Hiding Place",
        "wall" => "Wall",
        other => other,
    }
}
