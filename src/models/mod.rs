//! Game data model: villages, buildings, troops, farm targets, world config.

pub mod buildings;
pub mod farm_target;
pub mod troops;
pub mod village;
pub mod world;

pub use buildings::{building_label, Building, BuildQueueEntry, BuildStep, BUILDING_NAMES};
pub use farm_target::FarmTarget;
pub use troops::{TrainQueue, TroopCounts, UnitType, BARRACKS_UNITS, STABLE_UNITS, WORKSHOP_UNITS};
pub use village::{Resources, Village};
pub use world::{BuildingInfo, UnitInfo, WorldConfig};
