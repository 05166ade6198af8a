//! Incoming-attack detection.

use std::collections::HashSet;

use tracing::warn;

use crate::browser::Extractor;
use crate::error::BotResult;
use crate::models::Village;

pub struct DefenseMonitor {
    notified: HashSet<u64>,
}

impl DefenseMonitor {
    pub fn new() -> Self {
        Self { notified: HashSet::new() }
    }

    /// Check a village for incoming attacks, falling back to a rally-point
    /// read when the overview snapshot reports none (overview counts can
    /// lag). Notifies once per village until the attack clears.
    pub async fn check(&mut self, village: &Village, extractor: &dyn Extractor) -> BotResult<bool> {
        let mut incoming = village.incoming_attacks;
        if incoming == 0 {
            incoming = extractor.village(village.id).await?.incoming_attacks;
        }

        if incoming > 0 {
            if self.notified.insert(village.id) {
                warn!(village = village.id, name = %village.name, count = incoming, "incoming attack detected");
            }
            return Ok(true);
        }

        self.notified.remove(&village.id);
        Ok(false)
    }
}

impl Default for DefenseMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BuildingQueueState, FarmRow, ScavengeState, TrainingInfo};
    use crate::error::BotError;
    use crate::models::{Resources, TrainQueue, TroopCounts, WorldConfig};
    use async_trait::async_trait;

    struct StubExtractor {
        village: Village,
    }

    #[async_trait]
    impl Extractor for StubExtractor {
        async fn village(&self, _village_id: u64) -> BotResult<Village> {
            Ok(self.village.clone())
        }
        async fn world_config(&self) -> BotResult<WorldConfig> {
            Err(BotError::Extraction("unused".into()))
        }
        async fn village_ids(&self, _seed_village_id: u64) -> BotResult<Vec<u64>> {
            Ok(vec![])
        }
        async fn scavenge_state(&self, _village_id: u64) -> BotResult<ScavengeState> {
            Ok(ScavengeState::default())
        }
        async fn building_queue(&self, _village_id: u64) -> BotResult<BuildingQueueState> {
            Ok(BuildingQueueState::default())
        }
        async fn building_cost(&self, _village_id: u64, _building: &str, _target_level: i32) -> BotResult<Resources> {
            Ok(Resources::default())
        }
        async fn troop_counts(&self, _village_id: u64) -> BotResult<TroopCounts> {
            Ok(TroopCounts::default())
        }
        async fn training_info(&self, _village_id: u64, _unit: &str) -> BotResult<TrainingInfo> {
            Ok(TrainingInfo::default())
        }
        async fn farm_targets(&self, _village_id: u64) -> BotResult<Vec<FarmRow>> {
            Ok(vec![])
        }
        async fn farm_button_enabled(&self, _village_id: u64, _target_id: u64, _template: &str) -> BotResult<bool> {
            Ok(false)
        }
        async fn train_queue(&self, _village_id: u64, _building: &str) -> BotResult<Vec<TrainQueue>> {
            Ok(vec![])
        }
        async fn parse_haul(&self, _report_id: u64) -> BotResult<Option<Resources>> {
            Ok(None)
        }
        async fn report_list(&self, _village_id: u64) -> BotResult<Vec<crate::reports::ReportSummary>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn notifies_once_then_clears_on_recovery() {
        let mut village = Village { id: 1, incoming_attacks: 2, ..Default::default() };
        let extractor = StubExtractor { village: village.clone() };
        let mut monitor = DefenseMonitor::new();

        assert!(monitor.check(&village, &extractor).await.unwrap());
        assert!(monitor.check(&village, &extractor).await.unwrap());
        assert!(monitor.notified.contains(&1));

        village.incoming_attacks = 0;
        let extractor = StubExtractor { village: village.clone() };
        assert!(!monitor.check(&village, &extractor).await.unwrap());
        assert!(!monitor.notified.contains(&1));
    }
}
