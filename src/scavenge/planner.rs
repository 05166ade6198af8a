//! Scavenge run planning: troop allocation across unlocked tiers, gated on
//! whether any eligible tier is currently running.

use std::collections::HashMap;

use serde_json::json;

use crate::browser::{BrowserDriver, Extractor};
use crate::config::{self, ScavengingConfig};
use crate::error::BotResult;
use crate::models::TroopCounts;

use super::formulas::{allocate_by_ratio, calculate_duration, equal_runtime_weights, SCAVENGE_UNITS};

/// Filter a village's idle troops down to the units eligible for
/// scavenging: not excluded by config, and with count above the
/// configured reserve.
pub fn filter_troops(config: &ScavengingConfig, idle: &TroopCounts) -> HashMap<String, i64> {
    let mut available = HashMap::new();
    for unit in SCAVENGE_UNITS {
        if config.scavenge_exclude.iter().any(|excluded| excluded == unit) {
            continue;
        }
        let reserve = *config.scavenge_reserve.get(unit).unwrap_or(&0);
        let usable = idle.get(unit) - reserve;
        if usable > 0 {
            available.insert(unit.to_string(), usable);
        }
    }
    available
}

/// Pure allocation step: given idle troops and which tiers are unlocked,
/// compute the equal-runtime split. Returns an empty map if no tiers are
/// unlocked or nothing is eligible to send.
pub fn plan_ratio_allocation(
    config: &ScavengingConfig,
    carries: &HashMap<String, i64>,
    idle: &TroopCounts,
    unlocked_tiers: &[i32],
) -> HashMap<i32, HashMap<String, i64>> {
    if unlocked_tiers.is_empty() {
        return HashMap::new();
    }
    let available = filter_troops(config, idle);
    if available.is_empty() {
        return HashMap::new();
    }
    let weights = equal_runtime_weights(unlocked_tiers);
    allocate_by_ratio(&available, &weights, carries)
}

pub struct ScavengePlanner {
    config: ScavengingConfig,
    carries: HashMap<String, i64>,
    /// Epoch seconds of the latest return among tiers we last dispatched;
    /// `0.0` means nothing outstanding.
    next_return: f64,
}

impl ScavengePlanner {
    pub fn new(config: ScavengingConfig, carries: HashMap<String, i64>) -> Self {
        Self { config, carries, next_return: 0.0 }
    }

    pub fn seconds_until_return(&self, now: f64) -> f64 {
        if self.next_return > 0.0 {
            (self.next_return - now).max(0.0)
        } else {
            0.0
        }
    }

    fn update_return_times(&mut self, return_times: &HashMap<i32, f64>, unlocked: &[i32]) {
        let relevant: Vec<f64> = return_times
            .iter()
            .filter(|(tier, _)| unlocked.is_empty() || unlocked.contains(tier))
            .map(|(_, ts)| *ts)
            .collect();
        if let Some(max) = relevant.into_iter().fold(None, |acc: Option<f64>, ts| {
            Some(acc.map_or(ts, |a| a.max(ts)))
        }) {
            self.next_return = max;
        }
    }

    /// Run one scavenge cycle for `village_id`. Returns the number of
    /// tiers a dispatch was sent to (0 if gated, idle, or nothing
    /// unlocked).
    pub async fn run(
        &mut self,
        village_id: u64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
        now: f64,
    ) -> BotResult<usize> {
        if self.config.mode != "ratio" {
            // Legacy modes (time_based / max_efficiency / send_all) dispatch
            // through the same rally-point flow but without equal-runtime
            // weighting; ratio is the primary, spec-mandated mode.
            return self.run_legacy(village_id, driver, extractor, now).await;
        }

        driver.navigate(village_id, "place").await?;
        let state = extractor.scavenge_state(village_id).await?;

        let running_unlocked: Vec<i32> = state
            .running_tiers
            .iter()
            .copied()
            .filter(|tier| state.unlocked_tiers.contains(tier))
            .collect();

        if !running_unlocked.is_empty() {
            self.update_return_times(&state.return_times, &state.unlocked_tiers);
            let wait = self.seconds_until_return(now);
            if wait <= 90.0 {
                tokio::time::sleep(std::time::Duration::from_secs_f64(wait + 5.0)).await;
                let refreshed = extractor.scavenge_state(village_id).await?;
                let still_running = refreshed
                    .running_tiers
                    .iter()
                    .any(|tier| refreshed.unlocked_tiers.contains(tier));
                if still_running {
                    return Ok(0);
                }
            } else {
                return Ok(0);
            }
        }

        if state.idle_troops.total() == 0 {
            return Ok(0);
        }

        let allocations =
            plan_ratio_allocation(&self.config, &self.carries, &state.idle_troops, &state.unlocked_tiers);
        if allocations.is_empty() {
            return Ok(0);
        }

        if self.config.dry_run {
            return Ok(allocations.len());
        }

        let mut tiers_sent: Vec<i32> = allocations.keys().copied().collect();
        tiers_sent.sort_unstable_by(|a, b| b.cmp(a));
        let mut sent = 0usize;
        for tier in tiers_sent {
            let troops = &allocations[&tier];
            driver
                .submit("scavenge_dispatch", json!({ "village_id": village_id, "tier": tier, "troops": troops }))
                .await?;
            sent += 1;
        }

        if sent > 0 {
            let refreshed = extractor.scavenge_state(village_id).await?;
            self.update_return_times(&refreshed.return_times, &state.unlocked_tiers);
        }

        Ok(sent)
    }

    /// Legacy modes (send_all / time_based / max_efficiency): unlike
    /// `ratio`, each available tier is offered the whole remaining troop
    /// pool in turn, highest tier first, with the per-mode allocator
    /// deciding how much of the pool that tier actually gets.
    async fn run_legacy(
        &mut self,
        village_id: u64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
        _now: f64,
    ) -> BotResult<usize> {
        driver.navigate(village_id, "place").await?;
        let state = extractor.scavenge_state(village_id).await?;
        if state.idle_troops.total() == 0 {
            return Ok(0);
        }

        let mut available_tiers: Vec<i32> = state
            .unlocked_tiers
            .iter()
            .copied()
            .filter(|tier| !state.running_tiers.contains(tier))
            .collect();
        if available_tiers.is_empty() {
            return Ok(0);
        }
        available_tiers.sort_unstable_by(|a, b| b.cmp(a));
        let total_tiers = available_tiers.len();

        let mut remaining_troops = state.idle_troops.counts.clone();
        let mut sent = 0usize;

        for tier in available_tiers {
            let remaining_tiers = total_tiers - sent;
            let pool = TroopCounts { counts: remaining_troops.clone() };
            let scavenge_available = filter_troops(&self.config, &pool);
            if scavenge_available.is_empty() {
                continue;
            }

            let allocation = self.allocate_troops(&scavenge_available, tier, remaining_tiers);
            if allocation.is_empty() || allocation.values().all(|count| *count == 0) {
                continue;
            }

            driver
                .submit(
                    "scavenge_dispatch",
                    json!({ "village_id": village_id, "tier": tier, "troops": allocation }),
                )
                .await?;
            sent += 1;
            for (unit, count) in &allocation {
                let entry = remaining_troops.entry(unit.clone()).or_insert(0);
                *entry = (*entry - count).max(0);
            }
        }

        Ok(sent)
    }

    /// Dispatch to the allocator matching `config.mode`; `max_efficiency`
    /// is the catch-all default, matching the legacy config's own
    /// fallback behavior for an unrecognized mode string.
    fn allocate_troops(
        &self,
        available: &HashMap<String, i64>,
        tier: i32,
        remaining_tiers: usize,
    ) -> HashMap<String, i64> {
        match self.config.mode.as_str() {
            "send_all" => allocate_send_all(available, remaining_tiers),
            "time_based" => allocate_time_based(
                available,
                tier,
                remaining_tiers,
                self.config.target_minutes,
                &self.carries,
                config::world().speed,
            ),
            _ => allocate_max_efficiency(available, tier),
        }
    }
}

/// Split the pool evenly across the tiers still to be offered this cycle;
/// the last tier in line takes whatever is left untouched.
fn allocate_send_all(available: &HashMap<String, i64>, remaining_tiers: usize) -> HashMap<String, i64> {
    if remaining_tiers <= 1 {
        return available.clone();
    }
    available
        .iter()
        .map(|(unit, count)| (unit.clone(), count / remaining_tiers as i64))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Start from an even split, then scale it so the run lands close to
/// `target_minutes`: too slow a run gets more troops, too fast a run
/// gets fewer, clamped to what's actually available.
fn allocate_time_based(
    available: &HashMap<String, i64>,
    tier: i32,
    remaining_tiers: usize,
    target_minutes: u32,
    carries: &HashMap<String, i64>,
    world_speed: f64,
) -> HashMap<String, i64> {
    let target_seconds = target_minutes as f64 * 60.0;
    let mut allocation = allocate_send_all(available, remaining_tiers);

    let carry_cap: f64 =
        allocation.iter().map(|(unit, count)| *count as f64 * *carries.get(unit).unwrap_or(&0) as f64).sum();
    let estimated = calculate_duration(carry_cap, tier, world_speed);
    if estimated > 0.0 {
        let ratio = target_seconds / estimated;
        allocation = allocation
            .into_iter()
            .map(|(unit, count)| (unit, ((count as f64 * ratio) as i64).max(1)))
            .collect();
        allocation = allocation
            .into_iter()
            .map(|(unit, count)| {
                let avail = *available.get(&unit).unwrap_or(&0);
                (unit, count.min(avail))
            })
            .collect();
    }

    allocation.into_iter().filter(|(_, count)| *count > 0).collect()
}

/// Weight each tier by its historical loot efficiency and send that
/// fraction of the pool; tiers above 4 fall back to a flat 25% weight.
fn allocate_max_efficiency(available: &HashMap<String, i64>, tier: i32) -> HashMap<String, i64> {
    let weight = match tier {
        1 => 0.1,
        2 => 0.2,
        3 => 0.3,
        4 => 0.4,
        _ => 0.25,
    };
    available
        .iter()
        .map(|(unit, count)| (unit.clone(), ((*count as f64 * weight) as i64).max(1)))
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScavengingConfig {
        ScavengingConfig {
            scavenge_exclude: vec![],
            ..ScavengingConfig::default()
        }
    }

    #[test]
    fn planner_returns_empty_without_unlocked_tiers() {
        let mut idle = TroopCounts::default();
        idle.set("spear", 1000);
        let carries = HashMap::from([("spear".to_string(), 25)]);
        let result = plan_ratio_allocation(&config(), &carries, &idle, &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn seconds_until_return_floors_at_zero() {
        let planner = ScavengePlanner::new(config(), HashMap::new());
        assert_eq!(planner.seconds_until_return(1_000.0), 0.0);
    }

    #[test]
    fn send_all_splits_evenly_across_remaining_tiers() {
        let available = HashMap::from([("spear".to_string(), 1000)]);
        let allocation = allocate_send_all(&available, 4);
        assert_eq!(allocation["spear"], 250);
        // Last tier in line keeps the whole remainder rather than splitting.
        let allocation = allocate_send_all(&available, 1);
        assert_eq!(allocation["spear"], 1000);
    }

    #[test]
    fn max_efficiency_scales_by_tier_weight() {
        let available = HashMap::from([("spear".to_string(), 1000)]);
        let tier1 = allocate_max_efficiency(&available, 1);
        let tier4 = allocate_max_efficiency(&available, 4);
        assert_eq!(tier1["spear"], 100);
        assert_eq!(tier4["spear"], 400);
        assert!(tier1["spear"] < tier4["spear"]);
    }

    #[test]
    fn legacy_modes_produce_different_allocations() {
        let available = HashMap::from([("spear".to_string(), 1000)]);
        let carries = HashMap::from([("spear".to_string(), 25)]);
        let send_all = allocate_send_all(&available, 2);
        let max_eff = allocate_max_efficiency(&available, 2);
        let time_based = allocate_time_based(&available, 2, 2, 120, &carries, 1.0);
        assert_ne!(send_all["spear"], max_eff["spear"]);
        assert_ne!(send_all["spear"], time_based["spear"]);
    }
}
