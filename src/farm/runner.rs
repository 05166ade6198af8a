//! Farm-assistant automation: per-row template choice and troop-exhaustion
//! detection, plus target intel tracked across farming cycles.

use std::collections::HashMap;

use serde_json::json;

use crate::browser::{BrowserDriver, Extractor};
use crate::config::FarmingConfig;
use crate::error::BotResult;
use crate::models::{FarmTarget, Resources};

/// Heavy ("C") template requires few carriers; light ("A") is the safe
/// fallback when the haul can't be estimated or needs too many light
/// cavalry to justify the heavier template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmTemplateChoice {
    Heavy,
    Light,
}

impl FarmTemplateChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            FarmTemplateChoice::Heavy => "c",
            FarmTemplateChoice::Light => "a",
        }
    }
}

/// Choose a template for one row given its estimated haul. `lc_carry` is
/// the light-cavalry carry capacity; `lc_threshold` is the max number of
/// light cavalry worth sending before the lighter template is preferred.
pub fn choose_template(
    estimated_haul: Option<i64>,
    lc_carry: i64,
    lc_threshold: u32,
) -> FarmTemplateChoice {
    let Some(haul) = estimated_haul else {
        return FarmTemplateChoice::Light;
    };
    if haul <= 0 || lc_carry <= 0 {
        return FarmTemplateChoice::Light;
    }
    let lc_needed = (haul + lc_carry - 1) / lc_carry;
    if lc_needed as u32 <= lc_threshold {
        FarmTemplateChoice::Heavy
    } else {
        FarmTemplateChoice::Light
    }
}

pub struct FarmRunner {
    config: FarmingConfig,
    lc_carry: i64,
    targets: HashMap<u64, FarmTarget>,
}

impl FarmRunner {
    pub fn new(config: FarmingConfig, lc_carry: i64) -> Self {
        Self { config, lc_carry, targets: HashMap::new() }
    }

    pub fn blacklist_target(&mut self, target_id: u64) {
        if let Some(target) = self.targets.get_mut(&target_id) {
            target.blacklisted = true;
        }
    }

    /// Fold intel from a combat report into the tracked target, blacklisting
    /// on a heavy wall or a defended target.
    pub fn update_target_intel(
        &mut self,
        target_id: u64,
        wall_level: Option<i32>,
        has_troops: Option<bool>,
        loot: Option<Resources>,
    ) {
        let Some(target) = self.targets.get_mut(&target_id) else { return };
        if let Some(wall_level) = wall_level {
            target.wall_level = wall_level;
            if wall_level > 5 {
                target.blacklisted = true;
            }
        }
        if let Some(has_troops) = has_troops {
            target.has_troops = has_troops;
            if has_troops {
                target.blacklisted = true;
            }
        }
        if let Some(loot) = loot {
            target.last_loot = loot;
        }
    }

    pub fn targets(&self) -> &HashMap<u64, FarmTarget> {
        &self.targets
    }

    /// Run one farming cycle. Returns the number of attacks sent.
    pub async fn run(
        &mut self,
        village_id: u64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
    ) -> BotResult<usize> {
        if !self.config.enabled {
            return Ok(0);
        }

        driver.navigate(village_id, "am_farm").await?;
        let rows = extractor.farm_targets(village_id).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut sent = 0usize;
        for row in rows {
            if self.targets.get(&row.target_id).is_some_and(|t| t.blacklisted) {
                continue;
            }

            let template = choose_template(row.estimated_haul, self.lc_carry, self.config.lc_threshold);

            driver
                .submit(
                    "farm_attack",
                    json!({ "village_id": village_id, "target_id": row.target_id, "template": template.as_str() }),
                )
                .await?;

            let still_enabled = extractor
                .farm_button_enabled(village_id, row.target_id, template.as_str())
                .await?;
            if still_enabled {
                break;
            }
            sent += 1;
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_haul_falls_back_to_light_template() {
        assert_eq!(choose_template(None, 80, 20), FarmTemplateChoice::Light);
    }

    #[test]
    fn low_carrier_need_picks_heavy_template() {
        // 1200 / 80 = 15 lc needed, <= threshold 20.
        assert_eq!(choose_template(Some(1200), 80, 20), FarmTemplateChoice::Heavy);
    }

    #[test]
    fn high_carrier_need_falls_back_to_light_template() {
        // 2000 / 80 = 25 lc needed, > threshold 20.
        assert_eq!(choose_template(Some(2000), 80, 20), FarmTemplateChoice::Light);
    }

    #[test]
    fn blacklisted_target_survives_wall_and_troop_updates() {
        let mut runner = FarmRunner::new(FarmingConfig::default(), 80);
        runner.targets.insert(7, FarmTarget { id: 7, ..Default::default() });
        runner.update_target_intel(7, Some(8), None, None);
        assert!(runner.targets[&7].blacklisted);
    }
}
