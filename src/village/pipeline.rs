//! Per-village automation cycle: gate on defense, run enabled managers in
//! a fresh shuffled order, feed reports back into farm intel.

use crate::browser::{BrowserDriver, Extractor};
use crate::building::BuildingPlanner;
use crate::config::{is_feature_enabled, AppConfig};
use crate::defense::DefenseMonitor;
use crate::error::BotResult;
use crate::farm::FarmRunner;
use crate::humanizer::Humanizer;
use crate::models::Village;
use crate::reports::ReportProcessor;
use crate::scavenge::ScavengePlanner;
use crate::troops::TroopRecruiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ManagerKind {
    Building,
    Troops,
    Farming,
    Scavenging,
}

/// Result of one village cycle, mirroring the summary fields the
/// Orchestrator needs for wake-up computation and panel reporting.
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    pub village: Option<Village>,
    pub under_attack: bool,
    pub build_queue_finish_ts: f64,
    pub build_resource_wait: f64,
    pub build_waiting_for: String,
    pub building_levels: std::collections::HashMap<String, i32>,
    pub scavenge_wait_seconds: f64,
    pub reports_processed: usize,
    pub manager_ok: Vec<(String, bool)>,
}

pub struct VillagePipeline<'a> {
    config: &'a AppConfig,
    humanizer: &'a Humanizer,
    defense: &'a mut DefenseMonitor,
    building: &'a BuildingPlanner,
    troops: &'a TroopRecruiter,
    farm: &'a mut FarmRunner,
    scavenge: &'a mut ScavengePlanner,
    reports: &'a mut ReportProcessor,
}

impl<'a> VillagePipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a AppConfig,
        humanizer: &'a Humanizer,
        defense: &'a mut DefenseMonitor,
        building: &'a BuildingPlanner,
        troops: &'a TroopRecruiter,
        farm: &'a mut FarmRunner,
        scavenge: &'a mut ScavengePlanner,
        reports: &'a mut ReportProcessor,
    ) -> Self {
        Self { config, humanizer, defense, building, troops, farm, scavenge, reports }
    }

    fn resolve(&self, village_id: u64, feature: &str) -> bool {
        is_feature_enabled(self.config, village_id, feature)
    }

    fn any_feature_needs_overview(&self, village_id: u64) -> bool {
        self.resolve(village_id, "building") || self.resolve(village_id, "farming") || self.resolve(village_id, "troops")
    }

    pub async fn run_cycle(
        &mut self,
        village_id: u64,
        driver: &dyn BrowserDriver,
        extractor: &dyn Extractor,
        now: f64,
    ) -> BotResult<CycleResult> {
        let mut result = CycleResult::default();

        if !self.any_feature_needs_overview(village_id) {
            return Ok(result);
        }

        driver.navigate(village_id, "overview").await?;
        let village = extractor.village(village_id).await?;
        result.village = Some(village.clone());

        let under_attack = self.defense.check(&village, extractor).await?;
        result.under_attack = under_attack;
        if under_attack {
            if self.resolve(village_id, "farming") {
                result.reports_processed = self.run_reports(village_id, extractor).await?;
            }
            return Ok(result);
        }

        let mut managers = Vec::new();
        if self.resolve(village_id, "building") {
            managers.push(ManagerKind::Building);
        }
        if self.resolve(village_id, "troops") {
            managers.push(ManagerKind::Troops);
        }
        if self.resolve(village_id, "farming") {
            managers.push(ManagerKind::Farming);
        }
        if self.resolve(village_id, "scavenging") {
            managers.push(ManagerKind::Scavenging);
        }
        let managers = self.humanizer.shuffle_order(&managers);

        for kind in managers {
            let name = match kind {
                ManagerKind::Building => "building",
                ManagerKind::Troops => "troops",
                ManagerKind::Farming => "farming",
                ManagerKind::Scavenging => "scavenging",
            };

            let outcome = match kind {
                ManagerKind::Building => {
                    let premium = village.premium;
                    self.building.run(village_id, premium, driver, extractor).await.map(|build| {
                        if build.queue_finish_ts > 0.0 {
                            result.build_queue_finish_ts = build.queue_finish_ts;
                        }
                        if build.resource_wait > 0.0 {
                            result.build_resource_wait = build.resource_wait;
                            result.build_waiting_for = build.building_name.clone();
                        }
                        result.building_levels = build.levels;
                        true
                    })
                }
                ManagerKind::Troops => self.troops.run(village_id, driver, extractor).await,
                ManagerKind::Farming => self.farm.run(village_id, driver, extractor).await.map(|sent| sent > 0),
                ManagerKind::Scavenging => {
                    self.scavenge.run(village_id, driver, extractor, now).await.map(|sent| sent > 0)
                }
            };

            match outcome {
                Ok(ok) => result.manager_ok.push((name.to_string(), ok)),
                Err(err) => {
                    tracing::error!(manager = name, village = village_id, error = %err, "manager failed");
                    result.manager_ok.push((name.to_string(), false));
                }
            }

            driver.navigate(village_id, "overview").await?;
            self.humanizer.wait(&format!("after_{name}")).await;
        }

        if self.resolve(village_id, "farming") {
            result.reports_processed = self.run_reports(village_id, extractor).await.unwrap_or(0);
        }

        let wait = self.scavenge.seconds_until_return(now);
        if wait > 0.0 {
            result.scavenge_wait_seconds = wait;
        }

        Ok(result)
    }

    async fn run_reports(&mut self, village_id: u64, extractor: &dyn Extractor) -> BotResult<usize> {
        let reports = extractor.report_list(village_id).await?;
        self.reports.run(&reports, self.farm)
    }
}
