//! Building-queue planning: picking the next upgrade and projecting how
//! long resources will take to arrive if it can't yet be afforded.

use std::collections::HashMap;
use std::path::Path;

use serde_json::json;

use crate::browser::{BrowserDriver, BuildingQueueState, Extractor};
use crate::config::{self, BuildingConfig};
use crate::error::{BotError, BotResult};
use crate::models::{BuildStep, Resources};

/// Outcome of one building-planner attempt at a village.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub ordered: bool,
    pub building_name: String,
    pub queue_finish_ts: f64,
    pub resource_wait: f64,
    pub levels: HashMap<String, i32>,
}

#[derive(Debug, Clone)]
pub enum BuildMode {
    Sequential(Vec<BuildStep>),
    Priority { targets: HashMap<String, i32>, order: Vec<String> },
}

/// How many build-queue slots the game grants: one without premium, two
/// with.
pub fn max_queue_slots(premium: bool) -> usize {
    if premium {
        2
    } else {
        1
    }
}

/// Project how long until resources arrive for `cost`, given `current`
/// holdings and `production` per-hour rates. If any deficient resource has
/// zero or negative production, the wait is immediately capped at 3600s
/// (one hour) rather than computed per-resource, since a zero-production
/// resource would otherwise wait forever.
pub fn calculate_resource_wait(current: &Resources, cost: &Resources, production: &Resources) -> f64 {
    let pairs = [
        (cost.wood - current.wood, production.wood),
        (cost.stone - current.stone, production.stone),
        (cost.iron - current.iron, production.iron),
    ];

    let mut max_wait = 0.0_f64;
    for (deficit, rate) in pairs {
        if deficit <= 0 {
            continue;
        }
        if rate <= 0 {
            return 3600.0;
        }
        let wait = deficit as f64 / (rate as f64 / 3600.0);
        if wait > max_wait {
            max_wait = wait;
        }
    }
    max_wait.min(3600.0)
}

/// Sequential mode: walk the declared step order, return the first step
/// whose target isn't yet met by current level + what's already queued.
pub fn pick_next_building_sequential(
    steps: &[BuildStep],
    levels: &HashMap<String, i32>,
    queue: &[crate::models::BuildQueueEntry],
) -> Option<BuildStep> {
    let mut queued_counts: HashMap<String, i32> = HashMap::new();
    for entry in queue {
        *queued_counts.entry(entry.building.clone()).or_insert(0) += 1;
    }
    for step in steps {
        let current = *levels.get(&step.building).unwrap_or(&0);
        let queued = *queued_counts.get(&step.building).unwrap_or(&0);
        if current + queued < step.level {
            return Some(step.clone());
        }
    }
    None
}

/// Priority mode: walk the declared priority order, return the first
/// building whose current level (plus one outstanding queue entry, since
/// priority mode targets a single level rather than a sequence) is below
/// its target.
pub fn pick_next_building_priority(
    order: &[String],
    targets: &HashMap<String, i32>,
    levels: &HashMap<String, i32>,
    queue: &[crate::models::BuildQueueEntry],
) -> Option<BuildStep> {
    let queued: std::collections::HashSet<&str> =
        queue.iter().map(|e| e.building.as_str()).collect();
    for building in order {
        let Some(target) = targets.get(building) else { continue };
        let current = *levels.get(building).unwrap_or(&0);
        if current < *target && !queued.contains(building.as_str()) {
            return Some(BuildStep { building: building.clone(), level: *target });
        }
    }
    None
}

pub struct BuildingPlanner {
    mode: BuildMode,
}

impl BuildingPlanner {
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    /// Swap in a sequential plan sourced from the panel's persisted build
    /// queue, overriding whatever the TOML template loaded at startup.
    pub fn set_mode(&mut self, mode: BuildMode) {
        self.mode = mode;
    }

    /// Load a template from `config.template`: sequential mode expects
    /// `[[buildings]]` entries in order; priority mode is not currently
    /// expressible from a single TOML array and always falls back to
    /// sequential — priority mode's targets come from config directly,
    /// not from a template file.
    pub fn from_template(config: &BuildingConfig, base_dir: &Path) -> anyhow::Result<Self> {
        let steps = config::load_building_template(&base_dir.join(&config.template))?;
        let build_steps = steps
            .into_iter()
            .map(|(building, level)| BuildStep { building, level })
            .collect();
        Ok(Self::new(BuildMode::Sequential(build_steps)))
    }

    fn pick_next(
        &self,
        levels: &HashMap<String, i32>,
        queue: &[crate::models::BuildQueueEntry],
    ) -> Option<BuildStep> {
        match &self.mode {
            BuildMode::Sequential(steps) => pick_next_building_sequential(steps, levels, queue),
            BuildMode::Priority { targets, order } => {
                pick_next_building_priority(order, targets, levels, queue)
            }
        }
    }

    /// Run one building-planner pass for `village_id`. Attempts up to
    /// `max_queue_slots(premium)` upgrades, breaking early on an
    /// unaffordable candidate (returning the resource wait) or a full
    /// queue signal from the driver.
    pub async fn run(
        &self,
        village_id: u64,
        premium: bool,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
    ) -> BotResult<BuildResult> {
        let mut result = BuildResult::default();
        let max_attempts = max_queue_slots(premium);

        driver.navigate(village_id, "main").await?;

        for _ in 0..max_attempts {
            let BuildingQueueState { queue, levels } = extractor.building_queue(village_id).await?;
            result.levels = levels.clone();
            result.queue_finish_ts = queue
                .iter()
                .filter_map(|entry| entry.finish_time.map(|ts| ts.timestamp() as f64))
                .fold(0.0, f64::max);

            if queue.len() >= max_attempts {
                break;
            }

            let Some(candidate) = self.pick_next(&levels, &queue) else {
                break;
            };

            let cost = extractor.building_cost(village_id, &candidate.building, candidate.level).await?;
            let village = extractor.village(village_id).await?;

            if village.resources.can_afford(&cost) {
                match driver
                    .submit(
                        "building_upgrade",
                        json!({ "village_id": village_id, "building": candidate.building, "level": candidate.level }),
                    )
                    .await
                {
                    Ok(()) => continue,
                    Err(BotError::QueueFull) => break,
                    Err(err) => return Err(err),
                }
            }

            result.resource_wait =
                calculate_resource_wait(&village.resources, &cost, &village.production);
            result.building_name = candidate.building;
            break;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_wait_matches_worked_example() {
        let current = Resources::new(0, 500, 500);
        let cost = Resources::new(100, 100, 100);
        let production = Resources::new(360, 360, 360);
        assert_eq!(calculate_resource_wait(&current, &cost, &production), 1000.0);
    }

    #[test]
    fn zero_production_caps_wait_at_3600() {
        let current = Resources::new(0, 500, 500);
        let cost = Resources::new(100, 100, 100);
        let production = Resources::new(0, 360, 360);
        assert_eq!(calculate_resource_wait(&current, &cost, &production), 3600.0);
    }

    #[test]
    fn sequential_pick_skips_satisfied_steps_with_double_counted_queue() {
        let steps = vec![
            BuildStep { building: "main".to_string(), level: 3 },
            BuildStep { building: "wood".to_string(), level: 1 },
            BuildStep { building: "stone".to_string(), level: 1 },
        ];
        let levels = HashMap::from([("main".to_string(), 1)]);
        let queue = vec![
            crate::models::BuildQueueEntry { building: "main".to_string(), target_level: 2, finish_time: None },
            crate::models::BuildQueueEntry { building: "main".to_string(), target_level: 3, finish_time: None },
        ];
        let picked = pick_next_building_sequential(&steps, &levels, &queue).unwrap();
        assert_eq!(picked.building, "wood");
    }

    #[test]
    fn max_queue_is_one_without_premium_two_with() {
        assert_eq!(max_queue_slots(false), 1);
        assert_eq!(max_queue_slots(true), 2);
    }
}
