//! Pure scavenge math: run duration, loot, runs-per-hour, and the
//! equal-runtime troop allocation algorithm. No IO, no game state beyond
//! what's passed in — kept standalone so it can be exhaustively unit
//! tested.

use std::collections::HashMap;

/// Scavenge tiers, highest difficulty first in loot share.
pub const SCAVENGE_UNITS: [&str; 7] =
    ["spear", "sword", "axe", "archer", "light", "marcher", "heavy"];

fn loot_ratio(tier: i32) -> f64 {
    match tier {
        1 => 0.10,
        2 => 0.25,
        3 => 0.50,
        4 => 0.75,
        _ => 0.0,
    }
}

/// Seconds for one scavenge run at `tier` with total carry capacity
/// `carry_cap`, at the given `world_speed`.
pub fn calculate_duration(carry_cap: f64, tier: i32, world_speed: f64) -> f64 {
    let ratio = loot_ratio(tier);
    ((carry_cap.powi(2) * 100.0 * ratio.powi(2)).powf(0.45) + 1800.0) * world_speed.powf(-0.55)
}

/// Resources looted for one run at `tier`.
pub fn calculate_loot(carry_cap: f64, tier: i32) -> f64 {
    carry_cap * loot_ratio(tier)
}

/// Resources-per-hour for a tier, given the run duration.
pub fn calculate_rph(carry_cap: f64, tier: i32, world_speed: f64) -> f64 {
    let duration = calculate_duration(carry_cap, tier, world_speed);
    if duration <= 0.0 {
        return 0.0;
    }
    calculate_loot(carry_cap, tier) / duration * 3600.0
}

/// Weight each tier so that, when troops are allocated proportionally to
/// weight, every tier's run finishes at roughly the same time: weight is
/// the inverse of the tier's loot ratio.
pub fn equal_runtime_weights(tiers: &[i32]) -> HashMap<i32, f64> {
    tiers
        .iter()
        .filter(|t| loot_ratio(**t) > 0.0)
        .map(|t| (*t, 1.0 / loot_ratio(*t)))
        .collect()
}

/// Allocate an available troop pool across scavenge tiers proportional to
/// `weights`, packing the highest tiers first and dumping every leftover
/// unit into the lowest-weighted ("dump") tier so nothing sits idle.
///
/// `available` and `carries` are keyed by unit name (see
/// [`SCAVENGE_UNITS`]); tiers not present in `weights` are never populated.
pub fn allocate_by_ratio(
    available: &HashMap<String, i64>,
    weights: &HashMap<i32, f64>,
    carries: &HashMap<String, i64>,
) -> HashMap<i32, HashMap<String, i64>> {
    if weights.is_empty() {
        return HashMap::new();
    }

    let mut remaining = available.clone();
    let total_weight: f64 = weights.values().sum();
    let total_carry: i64 = SCAVENGE_UNITS
        .iter()
        .map(|unit| {
            let count = *available.get(*unit).unwrap_or(&0);
            let carry = *carries.get(*unit).unwrap_or(&0);
            count * carry
        })
        .sum();

    let dump_tier = *weights.keys().min().expect("checked non-empty above");
    let mut tiers_desc: Vec<i32> = weights.keys().copied().filter(|t| *t != dump_tier).collect();
    tiers_desc.sort_unstable_by(|a, b| b.cmp(a));

    let mut units_by_carry_desc: Vec<String> =
        SCAVENGE_UNITS.iter().map(|u| u.to_string()).collect();
    units_by_carry_desc.sort_by_key(|u| std::cmp::Reverse(*carries.get(u).unwrap_or(&0)));

    let mut allocations: HashMap<i32, HashMap<String, i64>> = HashMap::new();

    for tier in tiers_desc {
        let weight = weights[&tier];
        let target = total_carry as f64 * weight / total_weight;
        let mut filled = 0.0_f64;
        let tier_alloc = allocations.entry(tier).or_default();
        for unit in &units_by_carry_desc {
            if filled >= target {
                break;
            }
            let avail = *remaining.get(unit).unwrap_or(&0);
            let carry = *carries.get(unit).unwrap_or(&0);
            if avail <= 0 || carry <= 0 {
                continue;
            }
            let gap = target - filled;
            let want = (gap / carry as f64).floor() as i64;
            let take = want.min(avail);
            if take <= 0 {
                continue;
            }
            *remaining.get_mut(unit).expect("unit present in remaining") -= take;
            *tier_alloc.entry(unit.clone()).or_insert(0) += take;
            filled += take as f64 * carry as f64;
        }
    }

    let dump_alloc = allocations.entry(dump_tier).or_default();
    for unit in SCAVENGE_UNITS.iter() {
        let count = *remaining.get(*unit).unwrap_or(&0);
        if count > 0 {
            *dump_alloc.entry(unit.to_string()).or_insert(0) += count;
        }
    }

    allocations.retain(|_, troops| !troops.is_empty());
    allocations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_runtime_allocation_matches_worked_example() {
        let mut available = HashMap::new();
        available.insert("spear".to_string(), 1000);
        let mut carries = HashMap::new();
        carries.insert("spear".to_string(), 25);
        let weights = equal_runtime_weights(&[1, 2]);
        assert_eq!(weights[&1], 10.0);
        assert_eq!(weights[&2], 4.0);

        let allocations = allocate_by_ratio(&available, &weights, &carries);
        assert_eq!(allocations[&2]["spear"], 285);
        assert_eq!(allocations[&1]["spear"], 715);

        // Zero-waste: every troop ends up somewhere.
        let total: i64 = allocations.values().flat_map(|t| t.values()).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn allocation_drops_empty_tiers() {
        let available = HashMap::new();
        let carries = HashMap::new();
        let weights = equal_runtime_weights(&[1, 2]);
        let allocations = allocate_by_ratio(&available, &weights, &carries);
        assert!(allocations.is_empty());
    }
}
