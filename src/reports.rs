//! Battle-report processing: feeds intel back into farm target tracking.

use std::collections::HashSet;

use crate::error::BotResult;
use crate::farm::FarmRunner;
use crate::models::Resources;

#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub id: u64,
    pub is_attack: bool,
    pub target_x: i32,
    pub target_y: i32,
    pub wall_level: Option<i32>,
    pub defender_had_troops: bool,
    pub loot: Option<Resources>,
}

pub struct ReportProcessor {
    processed: HashSet<u64>,
}

impl ReportProcessor {
    pub fn new() -> Self {
        Self { processed: HashSet::new() }
    }

    /// Process a batch of reports already fetched by the caller, updating
    /// `farm`'s target intel for attack reports matched by coordinates.
    /// Returns the count of newly processed attack reports.
    pub fn run(&mut self, reports: &[ReportSummary], farm: &mut FarmRunner) -> BotResult<usize> {
        let mut processed = 0;
        for report in reports {
            if !self.processed.insert(report.id) {
                continue;
            }
            if !report.is_attack {
                continue;
            }

            let target_id = farm
                .targets()
                .iter()
                .find(|(_, target)| target.x == report.target_x && target.y == report.target_y)
                .map(|(id, _)| *id);

            if let Some(target_id) = target_id {
                farm.update_target_intel(
                    target_id,
                    report.wall_level,
                    Some(report.defender_had_troops),
                    report.loot,
                );
            }
            processed += 1;
        }
        Ok(processed)
    }
}

impl Default for ReportProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarmingConfig;

    #[test]
    fn skips_already_seen_report_ids() {
        let mut farm = FarmRunner::new(FarmingConfig::default(), 80);
        let report = ReportSummary {
            id: 1,
            is_attack: true,
            target_x: 500,
            target_y: 500,
            wall_level: Some(3),
            defender_had_troops: false,
            loot: Some(Resources::new(100, 50, 25)),
        };
        let mut processor = ReportProcessor::new();

        assert_eq!(processor.run(&[report.clone()], &mut farm).unwrap(), 1);
        assert_eq!(processor.run(&[report], &mut farm).unwrap(), 0);
    }

    #[test]
    fn non_attack_reports_are_marked_seen_without_counting() {
        let mut farm = FarmRunner::new(FarmingConfig::default(), 80);
        let report = ReportSummary {
            id: 2,
            is_attack: false,
            target_x: 0,
            target_y: 0,
            wall_level: None,
            defender_had_troops: false,
            loot: None,
        };
        let mut processor = ReportProcessor::new();
        assert_eq!(processor.run(&[report.clone()], &mut farm).unwrap(), 0);
        assert_eq!(processor.run(&[report], &mut farm).unwrap(), 0);
    }
}
