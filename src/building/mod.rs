//! Building-queue planning.

pub mod planner;

pub use planner::{
    calculate_resource_wait, max_queue_slots, pick_next_building_priority,
    pick_next_building_sequential, BuildMode, BuildResult, BuildingPlanner,
};
