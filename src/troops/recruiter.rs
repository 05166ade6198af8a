//! Auto-recruitment: train troops toward configured targets, or fill the
//! scavenge wait with a single batch of training.

use std::collections::HashMap;

use serde_json::json;

use crate::browser::{BrowserDriver, Extractor};
use crate::config::TroopsConfig;
use crate::error::BotResult;
use crate::models::{BARRACKS_UNITS, STABLE_UNITS};

const BARRACKS_BATCH_CAP: i64 = 50;
const STABLE_BATCH_CAP: i64 = 25;

/// Barracks units subtract both owned and already-queued counts from the
/// target. Stable units only subtract owned — this asymmetry is carried
/// over unchanged from the source it's grounded on.
pub fn barracks_needs(
    targets: &HashMap<String, i64>,
    owned: &HashMap<String, i64>,
    queued: &HashMap<String, i64>,
) -> HashMap<String, i64> {
    let mut needs = HashMap::new();
    for unit in BARRACKS_UNITS {
        let name = unit.as_str();
        let target = *targets.get(name).unwrap_or(&0);
        if target <= 0 {
            continue;
        }
        let have = owned.get(name).unwrap_or(&0) + queued.get(name).unwrap_or(&0);
        let deficit = target - have;
        if deficit > 0 {
            needs.insert(name.to_string(), deficit.min(BARRACKS_BATCH_CAP));
        }
    }
    needs
}

pub fn stable_needs(targets: &HashMap<String, i64>, owned: &HashMap<String, i64>) -> HashMap<String, i64> {
    let mut needs = HashMap::new();
    for unit in STABLE_UNITS {
        let name = unit.as_str();
        let target = *targets.get(name).unwrap_or(&0);
        if target <= 0 {
            continue;
        }
        let deficit = target - owned.get(name).unwrap_or(&0);
        if deficit > 0 {
            needs.insert(name.to_string(), deficit.min(STABLE_BATCH_CAP));
        }
    }
    needs
}

/// Batch size for one-shot fill-scavenge training, or `None` if nothing
/// should be queued this cycle.
pub fn fill_scavenge_batch(remaining: f64, queue_seconds: f64, train_time: f64, max_affordable: i64) -> Option<i64> {
    if remaining <= 30.0 {
        return None;
    }
    if queue_seconds >= remaining - 30.0 {
        return None;
    }
    if train_time <= 0.0 || max_affordable <= 0 {
        return None;
    }
    let gap = remaining - queue_seconds;
    let batch = ((gap / train_time) as i64 + 1).max(1);
    Some(batch.min(max_affordable))
}

pub struct TroopRecruiter {
    config: TroopsConfig,
}

impl TroopRecruiter {
    pub fn new(config: TroopsConfig) -> Self {
        Self { config }
    }

    /// Execute one recruitment cycle in `targets` mode. Returns whether any
    /// troops were queued.
    pub async fn run(
        &self,
        village_id: u64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
    ) -> BotResult<bool> {
        if !self.config.enabled || self.config.mode != "targets" || self.config.targets.is_empty() {
            return Ok(false);
        }

        let mut trained_any = false;

        let owned = extractor.troop_counts(village_id).await?;
        let queue = extractor.train_queue(village_id, "barracks").await?;
        let mut queued = HashMap::new();
        for entry in &queue {
            *queued.entry(entry.unit.clone()).or_insert(0) += entry.count;
        }
        let needs = barracks_needs(&self.config.targets, &owned.counts, &queued);
        if !needs.is_empty() {
            driver.navigate(village_id, "barracks").await?;
            driver.submit("train_units", json!({ "village_id": village_id, "units": needs })).await?;
            trained_any = true;
        }

        let stable_owned = extractor.troop_counts(village_id).await?;
        let needs = stable_needs(&self.config.targets, &stable_owned.counts);
        if !needs.is_empty() {
            driver.navigate(village_id, "stable").await?;
            driver.submit("train_units", json!({ "village_id": village_id, "units": needs })).await?;
            trained_any = true;
        }

        Ok(trained_any)
    }

    /// Queue a single fill-scavenge batch. Returns the total queue duration
    /// (seconds) if a batch was submitted, for the caller to publish as a
    /// "Troop Queue" timer ending at `now + total`.
    pub async fn run_fill_scavenge(
        &self,
        village_id: u64,
        remaining: f64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
    ) -> BotResult<Option<f64>> {
        let Some(unit) = self.config.fill_units.first() else { return Ok(None) };

        let info = extractor.training_info(village_id, unit).await?;
        if !info.available {
            return Ok(None);
        }

        let Some(batch) =
            fill_scavenge_batch(remaining, info.queue_seconds, info.train_time, info.max_affordable)
        else {
            return Ok(None);
        };

        driver.navigate(village_id, "barracks").await?;
        driver
            .submit("train_units", json!({ "village_id": village_id, "units": { unit.clone(): batch } }))
            .await?;

        Ok(Some(info.queue_seconds + batch as f64 * info.train_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barracks_needs_subtracts_owned_and_queued() {
        let targets = HashMap::from([("spear".to_string(), 500)]);
        let owned = HashMap::from([("spear".to_string(), 400)]);
        let queued = HashMap::from([("spear".to_string(), 50)]);
        let needs = barracks_needs(&targets, &owned, &queued);
        assert_eq!(needs["spear"], 50);
    }

    #[test]
    fn barracks_needs_caps_batch_at_fifty() {
        let targets = HashMap::from([("spear".to_string(), 1000)]);
        let owned = HashMap::new();
        let queued = HashMap::new();
        let needs = barracks_needs(&targets, &owned, &queued);
        assert_eq!(needs["spear"], 50);
    }

    #[test]
    fn stable_needs_ignores_queued() {
        let targets = HashMap::from([("light".to_string(), 200)]);
        let owned = HashMap::from([("light".to_string(), 180)]);
        let needs = stable_needs(&targets, &owned);
        assert_eq!(needs["light"], 20);
    }

    #[test]
    fn fill_scavenge_skips_when_remaining_too_short() {
        assert_eq!(fill_scavenge_batch(20.0, 0.0, 10.0, 100), None);
    }

    #[test]
    fn fill_scavenge_skips_when_queue_already_sufficient() {
        assert_eq!(fill_scavenge_batch(100.0, 80.0, 10.0, 100), None);
    }

    #[test]
    fn fill_scavenge_batch_fills_the_gap() {
        // gap = 100 - 10 = 90, train_time = 20 -> floor(90/20) + 1 = 5
        assert_eq!(fill_scavenge_batch(100.0, 10.0, 20.0, 100), Some(5));
    }

    #[test]
    fn fill_scavenge_batch_clamped_by_affordability() {
        assert_eq!(fill_scavenge_batch(100.0, 10.0, 20.0, 2), Some(2));
    }
}
