//! Top-level loop: active-hours gate, shuffled per-cycle village
//! processing, cross-village wake-up computation, and the
//! [`ActionDispatcher`] that applies action-bus commands to shared state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Timelike;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::action_bus::{Action, BqDirection, TriState};
use crate::browser::BrowserDriver;
use crate::building::{BuildMode, BuildingPlanner};
use crate::config::{AppConfig, FeatureOverride, VillageOverride};
use crate::defense::DefenseMonitor;
use crate::error::BotError;
use crate::farm::FarmRunner;
use crate::humanizer::Humanizer;
use crate::models::BuildStep;
use crate::panel::{PanelProjection, PanelStateStore, VillageConfig, VillageStatus};
use crate::protection;
use crate::reports::ReportProcessor;
use crate::scavenge::ScavengePlanner;
use crate::storage;
use crate::troops::TroopRecruiter;
use crate::village::VillagePipeline;

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Parse a `"HH:MM-HH:MM"` window and test whether the current local time
/// falls within it. An unparseable string is treated as "always active"
/// rather than "never active" — a malformed window should fail open.
fn is_active_hours(window: &str) -> bool {
    let Some((start, end)) = window.split_once('-') else { return true };
    let parse = |s: &str| -> Option<(u32, u32)> {
        let (h, m) = s.trim().split_once(':')?;
        Some((h.parse().ok()?, m.parse().ok()?))
    };
    let (Some((sh, sm)), Some((eh, em))) = (parse(start), parse(end)) else { return true };
    let now = chrono::Local::now();
    let now_minutes = now.hour() * 60 + now.minute();
    let start_minutes = sh * 60 + sm;
    let end_minutes = eh * 60 + em;
    (start_minutes..=end_minutes).contains(&now_minutes)
}

struct WakeEvent {
    name: &'static str,
    seconds: f64,
}

/// Pick the earliest event more than 30s away and add cycle-delay jitter;
/// falls back to `active_delay` jitter if nothing qualifies.
fn compute_wake_up(
    scavenge_wait: f64,
    build_queue_wait: f64,
    resource_wait: f64,
    farm_wait: f64,
    humanizer: &Humanizer,
    active_delay: (u64, u64),
) -> (f64, Option<&'static str>) {
    let candidates = [
        WakeEvent { name: "scavenge", seconds: scavenge_wait },
        WakeEvent { name: "build_queue", seconds: build_queue_wait },
        WakeEvent { name: "resources", seconds: resource_wait },
        WakeEvent { name: "farming", seconds: farm_wait },
    ];
    let earliest = candidates.into_iter().filter(|e| e.seconds > 30.0).min_by(|a, b| a.seconds.total_cmp(&b.seconds));

    match earliest {
        Some(event) => (event.seconds + humanizer.random_cycle_delay((10, 30)), Some(event.name)),
        None => (humanizer.random_cycle_delay(active_delay), None),
    }
}

fn feature_override_to_option(value: FeatureOverride) -> Option<bool> {
    match value {
        FeatureOverride::Inherit => None,
        FeatureOverride::Enabled => Some(true),
        FeatureOverride::Disabled => Some(false),
    }
}

/// Applies [`Action`]s to the handful of pieces of state an action can
/// touch — all of them already `Arc`-shared, so this is cheap to clone and
/// callable directly from HTTP/WS handlers: the mutation lands synchronously
/// before the response is built, so a caller never has to guess when it
/// took effect. The Orchestrator holds one too; `wake` lets either caller
/// cut the main loop's sleep short instead of waiting it out.
#[derive(Clone)]
pub struct ActionDispatcher {
    pub config: Arc<RwLock<AppConfig>>,
    pub panel: Arc<PanelStateStore>,
    pub projection: Arc<PanelProjection>,
    pub running: Arc<AtomicBool>,
    pub paused: Arc<AtomicBool>,
    pub protection_detected: Arc<AtomicBool>,
    pub protection_resolve: Arc<Notify>,
    pub wake: Arc<Notify>,
    pub data_dir: PathBuf,
}

impl ActionDispatcher {
    pub async fn apply_action(&self, action: Action) {
        match action {
            Action::Start => {
                self.paused.store(false, Ordering::SeqCst);
                self.panel.set_bot_state("running").await;
            }
            Action::Pause => {
                self.paused.store(true, Ordering::SeqCst);
                self.panel.set_bot_state("paused").await;
            }
            Action::Stop => {
                self.running.store(false, Ordering::SeqCst);
                self.panel.set_bot_state("stopped").await;
            }
            Action::ToggleBuilding(enabled) => self.toggle_global("building", enabled).await,
            Action::ToggleFarming(enabled) => self.toggle_global("farming", enabled).await,
            Action::ToggleScavenging(enabled) => self.toggle_global("scavenging", enabled).await,
            Action::ToggleTroops(enabled) => self.toggle_global("troops", enabled).await,
            Action::TabSwitch(tab) => self.panel.set_active_tab(tab).await,
            Action::LogFilter(filter) => self.panel.set_log_filter(filter).await,
            Action::SelectVillage(vid) => self.panel.set_active_village(vid).await,
            Action::VillageToggle { village_id, feature, value } => {
                self.set_village_override(village_id, &feature, value).await;
            }
            Action::FarmThreshold(threshold) => self.panel.set_farm_lc_threshold(threshold).await,
            Action::BqAdd { village_id, building, level } => {
                let mut steps = self.panel.build_queue(village_id).await;
                steps.push((building, level));
                self.panel.set_build_queue(village_id, steps).await;
                let _ = self.save_build_queues().await;
            }
            Action::BqRemove { village_id, index } => {
                let mut steps = self.panel.build_queue(village_id).await;
                if index < steps.len() {
                    steps.remove(index);
                    self.panel.set_build_queue(village_id, steps).await;
                    let _ = self.save_build_queues().await;
                }
            }
            Action::BqMove { village_id, index, direction } => {
                let mut steps = self.panel.build_queue(village_id).await;
                let swap_with = match direction {
                    BqDirection::Up => index.checked_sub(1),
                    BqDirection::Down => (index + 1 < steps.len()).then_some(index + 1),
                };
                if let Some(other) = swap_with {
                    if index < steps.len() {
                        steps.swap(index, other);
                        self.panel.set_build_queue(village_id, steps).await;
                        let _ = self.save_build_queues().await;
                    }
                }
            }
            Action::BqClear => {
                self.panel.set_all_build_queues(HashMap::new()).await;
                let _ = self.save_build_queues().await;
            }
            Action::ScavTroop { unit, enabled, reserve } => {
                self.panel.set_scavenge_troop(&unit, enabled, reserve).await;
                let mut config = self.config.write().await;
                if let Some(enabled) = enabled {
                    if enabled {
                        config.scavenging.scavenge_exclude.retain(|u| u != &unit);
                    } else if !config.scavenging.scavenge_exclude.contains(&unit) {
                        config.scavenging.scavenge_exclude.push(unit.clone());
                    }
                }
                if let Some(reserve) = reserve {
                    config.scavenging.scavenge_reserve.insert(unit, reserve);
                }
            }
            Action::FillUnit(unit) => self.panel.set_fill_unit(unit).await,
            Action::BotProtectionResolved => {
                // The actual state flip (clearing `protection_detected`,
                // resuming `running`, logging) happens inside
                // `protection::run_periodic`, which owns the detection FSM;
                // this just wakes it so it doesn't wait out its poll
                // interval first.
                self.protection_resolve.notify_one();
            }
        }
        self.wake.notify_one();
        self.projection.emit(self.projection.hello(self.panel.snapshot().await));
    }

    async fn toggle_global(&self, feature: &str, enabled: bool) {
        {
            let mut config = self.config.write().await;
            match feature {
                "building" => config.building.enabled = enabled,
                "farming" => config.farming.enabled = enabled,
                "scavenging" => config.scavenging.enabled = enabled,
                "troops" => config.troops.enabled = enabled,
                _ => return,
            }
        }
        self.panel.set_toggle(feature, enabled).await;
        let _ = self.save_toggle_states().await;
    }

    async fn set_village_override(&self, village_id: u64, feature: &str, value: TriState) {
        let mut config = self.config.write().await;
        let key = village_id.to_string();
        let over = config.village_overrides.entry(key).or_insert_with(VillageOverride::default);
        let resolved = match value {
            TriState::Inherit => FeatureOverride::Inherit,
            TriState::On => FeatureOverride::Enabled,
            TriState::Off => FeatureOverride::Disabled,
        };
        match feature {
            "building" => over.building = resolved,
            "farming" => over.farming = resolved,
            "scavenging" => over.scavenging = resolved,
            "troops" => over.troops = resolved,
            _ => return,
        }
        drop(config);

        let option = feature_override_to_option(resolved);
        self.panel
            .set_village_config(
                village_id,
                VillageConfig {
                    building: option.filter(|_| feature == "building"),
                    farming: option.filter(|_| feature == "farming"),
                    scavenging: option.filter(|_| feature == "scavenging"),
                    troops: option.filter(|_| feature == "troops"),
                },
            )
            .await;
    }

    pub async fn save_build_queues(&self) -> anyhow::Result<()> {
        let by_vid: HashMap<u64, Vec<storage::BuildQueueStep>> = self
            .panel
            .build_queues()
            .await
            .into_iter()
            .filter_map(|(vid, steps)| {
                vid.parse::<u64>().ok().map(|vid| {
                    (vid, steps.into_iter().map(|(building, level)| storage::BuildQueueStep { building, level }).collect())
                })
            })
            .collect();
        storage::save_build_queues(&self.data_dir, &by_vid)
    }

    pub async fn save_toggle_states(&self) -> anyhow::Result<()> {
        storage::save_toggle_states(&self.data_dir, &self.panel.toggle_states().await)
    }
}

/// Everything the Orchestrator needs to track per village beyond what
/// lives in `PanelState`: the next scheduled farm run.
#[derive(Default)]
struct VillageRuntime {
    next_farm_time: f64,
}

pub struct Orchestrator {
    dispatch: ActionDispatcher,
    driver: Arc<Mutex<Box<dyn BrowserDriver>>>,
    extractor: Arc<dyn crate::browser::Extractor>,
    humanizer: Humanizer,
    cancel: CancellationToken,

    village_ids: Vec<u64>,
    runtimes: HashMap<u64, VillageRuntime>,

    defense: DefenseMonitor,
    building: BuildingPlanner,
    troops: TroopRecruiter,
    farm: FarmRunner,
    scavenge: ScavengePlanner,
    reports: ReportProcessor,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatch: ActionDispatcher,
        driver: Arc<Mutex<Box<dyn BrowserDriver>>>,
        extractor: Arc<dyn crate::browser::Extractor>,
        humanizer: Humanizer,
        cancel: CancellationToken,
        village_ids: Vec<u64>,
        building: BuildingPlanner,
        troops: TroopRecruiter,
        farm: FarmRunner,
        scavenge: ScavengePlanner,
    ) -> Self {
        let runtimes = village_ids.iter().map(|&id| (id, VillageRuntime::default())).collect();
        Self {
            dispatch,
            driver,
            extractor,
            humanizer,
            cancel,
            village_ids,
            runtimes,
            defense: DefenseMonitor::new(),
            building,
            troops,
            farm,
            scavenge,
            reports: ReportProcessor::new(),
        }
    }

    pub fn dispatcher(&self) -> ActionDispatcher {
        self.dispatch.clone()
    }

    /// Restore persisted build queues and toggle states into panel state
    /// at startup, matching `_load_build_queues`/`_load_toggle_states`.
    pub async fn load_persisted_state(&self) {
        match storage::load_build_queues(&self.dispatch.data_dir) {
            Ok(queues) => {
                let mut total = 0usize;
                let mut by_string = HashMap::new();
                for (vid, steps) in queues {
                    total += steps.len();
                    by_string.insert(
                        vid.to_string(),
                        steps.into_iter().map(|s| (s.building, s.level)).collect(),
                    );
                }
                info!(villages = by_string.len(), total_steps = total, "build queues loaded");
                self.dispatch.panel.set_all_build_queues(by_string).await;
            }
            Err(err) => warn!(error = %err, "build queues load failed"),
        }

        let toggles = storage::load_toggle_states(&self.dispatch.data_dir);
        for (feature, enabled) in toggles {
            self.dispatch.panel.set_toggle(&feature, enabled).await;
        }

        self.dispatch.panel.set_village_ids(self.village_ids.clone()).await;
        if let Some(&first) = self.village_ids.first() {
            self.dispatch.panel.set_active_village(first).await;
        }

        let config = self.dispatch.config.read().await;
        for &vid in &self.village_ids {
            if let Some(over) = config.village_overrides.get(&vid.to_string()) {
                self.dispatch
                    .panel
                    .set_village_config(
                        vid,
                        VillageConfig {
                            building: feature_override_to_option(over.building),
                            farming: feature_override_to_option(over.farming),
                            scavenging: feature_override_to_option(over.scavenging),
                            troops: feature_override_to_option(over.troops),
                        },
                    )
                    .await;
            }
        }
    }

    /// The main loop: `initializing -> running <-> paused -> stopped`.
    /// Runs until `running` is cleared (via a `stop` action or SIGTERM).
    pub async fn run(&mut self) {
        self.dispatch.running.store(true, Ordering::SeqCst);
        self.dispatch.panel.set_bot_state("running").await;
        self.dispatch.panel.add_log("Bot started", "info").await;
        info!(villages = self.village_ids.len(), "bot started");

        while self.dispatch.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            if self.dispatch.protection_detected.load(Ordering::SeqCst) {
                self.sleep_interruptible(std::time::Duration::from_secs(5)).await;
                continue;
            }

            if self.dispatch.paused.load(Ordering::SeqCst) {
                self.sleep_interruptible(std::time::Duration::from_secs(5)).await;
                continue;
            }

            let bot_active_hours = self.dispatch.config.read().await.bot.active_hours.clone();
            if !is_active_hours(&bot_active_hours) {
                let inactive_delay = self.dispatch.config.read().await.bot.inactive_delay;
                let delay = self.humanizer.random_cycle_delay(inactive_delay);
                self.dispatch.panel.add_log("Outside active hours, waiting...", "debug").await;
                self.sleep_interruptible(std::time::Duration::from_secs_f64(delay)).await;
                continue;
            }

            let order = self.humanizer.shuffle_order(&self.village_ids);
            let mut min_resource_wait = f64::INFINITY;
            let mut min_build_finish = f64::INFINITY;
            let now = now_epoch();

            for village_id in &order {
                if !self.dispatch.running.load(Ordering::SeqCst)
                    || self.dispatch.paused.load(Ordering::SeqCst)
                    || self.cancel.is_cancelled()
                {
                    break;
                }
                let (resource_wait, build_finish) = self.process_village(*village_id, now).await;
                if resource_wait > 0.0 && resource_wait < min_resource_wait {
                    min_resource_wait = resource_wait;
                }
                if build_finish > now && build_finish < min_build_finish {
                    min_build_finish = build_finish;
                }
            }

            let scavenge_wait = self.scavenge.seconds_until_return(now);
            let build_queue_wait = if min_build_finish.is_finite() { (min_build_finish - now).max(0.0) } else { 0.0 };
            let resource_wait = if min_resource_wait.is_finite() { min_resource_wait } else { 0.0 };
            let farm_wait = order
                .first()
                .and_then(|vid| self.runtimes.get(vid))
                .map(|rt| (rt.next_farm_time - now).max(0.0))
                .unwrap_or(0.0);

            let active_delay = self.dispatch.config.read().await.bot.active_delay;
            let (mut wake, event_name) =
                compute_wake_up(scavenge_wait, build_queue_wait, resource_wait, farm_wait, &self.humanizer, active_delay);

            match event_name {
                Some(name) => info!(seconds = wake.round() as i64, event = name, "cycle wait"),
                None => info!(seconds = wake.round() as i64, "cycle wait"),
            }
            self.dispatch.panel.set_timer("next_cycle", "Next Cycle", now + wake, "cycle").await;

            let (troops_enabled, troops_mode) = {
                let config = self.dispatch.config.read().await;
                (config.troops.enabled, config.troops.mode.clone())
            };

            if troops_enabled && troops_mode == "fill_scavenge" && scavenge_wait > 120.0 && wake > 120.0 {
                if let Some(&vid) = order.first() {
                    self.dispatch
                        .panel
                        .add_log(format!("Training troops while waiting ({:.0}min scavenge)", scavenge_wait / 60.0), "info")
                        .await;
                    let guard = self.driver.lock().await;
                    let driver: &dyn BrowserDriver = &**guard;
                    match self.troops.run_fill_scavenge(vid, scavenge_wait, driver, &*self.extractor).await {
                        Ok(Some(total)) => {
                            self.dispatch.panel.set_timer("troop_queue", "Troop Queue", now_epoch() + total, "troops").await;
                        }
                        Ok(None) => {}
                        Err(err) => warn!(error = %err, "fill-scavenge training failed"),
                    }
                    drop(guard);

                    // Open Question (b): only scavenge_wait and farm_wait are
                    // recomputed post-training, never build_queue_wait.
                    let scavenge_remaining = self.scavenge.seconds_until_return(now_epoch());
                    let farm_remaining = self
                        .runtimes
                        .get(&vid)
                        .map(|rt| (rt.next_farm_time - now_epoch()).max(0.0))
                        .unwrap_or(0.0);
                    let post_candidates = [scavenge_remaining, farm_remaining].into_iter().filter(|w| *w > 0.0);
                    if let Some(earliest) = post_candidates.reduce(f64::min) {
                        wake = earliest + self.humanizer.random_cycle_delay((10, 30));
                        self.dispatch.panel.set_timer("next_cycle", "Next Cycle", now_epoch() + wake, "cycle").await;
                    }
                }
            }

            self.sleep_interruptible(std::time::Duration::from_secs_f64(wake.max(0.0))).await;
        }

        self.dispatch.panel.set_bot_state("stopped").await;
        self.dispatch.panel.add_log("Bot stopped", "info").await;
    }

    /// Process one village. Protection/session/captcha signals transition
    /// bot state instead of propagating as errors. Returns
    /// `(resource_wait_seconds, build_queue_finish_ts)`.
    async fn process_village(&mut self, village_id: u64, now: f64) -> (f64, f64) {
        self.sync_build_queue_from_panel(village_id).await;

        let config = self.dispatch.config.read().await.clone();
        let guard = self.driver.lock().await;
        let driver: &dyn BrowserDriver = &**guard;
        let mut pipeline = VillagePipeline::new(
            &config,
            &self.humanizer,
            &mut self.defense,
            &self.building,
            &self.troops,
            &mut self.farm,
            &mut self.scavenge,
            &mut self.reports,
        );
        let result = pipeline.run_cycle(village_id, driver, &*self.extractor, now).await;
        drop(guard);

        match result {
            Ok(cycle) => {
                if !cycle.building_levels.is_empty() {
                    self.auto_remove_completed_steps(village_id, &cycle.building_levels).await;
                }
                if let Some(village) = &cycle.village {
                    self.dispatch
                        .panel
                        .set_village_status(VillageStatus {
                            village_id: village.id,
                            name: village.name.clone(),
                            x: village.x,
                            y: village.y,
                            points: village.points,
                            wood: village.resources.wood,
                            stone: village.resources.stone,
                            iron: village.resources.iron,
                            storage: village.storage,
                            population: village.population,
                            max_population: village.max_population,
                            incoming: village.incoming_attacks,
                            wood_rate: village.production.wood,
                            stone_rate: village.production.stone,
                            iron_rate: village.production.iron,
                        })
                        .await;
                    self.dispatch.panel.set_active_village(village.id).await;
                    self.dispatch.panel.add_log(format!("Processed: {}", village.name), "info").await;
                }

                if cycle.scavenge_wait_seconds > 0.0 {
                    self.dispatch
                        .panel
                        .set_timer("scavenge_return", "Scavenge Return", now + cycle.scavenge_wait_seconds, "scavenge")
                        .await;
                }
                if cycle.build_queue_finish_ts > now {
                    self.dispatch.panel.set_timer("building_queue", "Build Queue", cycle.build_queue_finish_ts, "building").await;
                }
                if cycle.build_resource_wait > 0.0 {
                    self.dispatch
                        .panel
                        .set_timer(
                            "building_resources",
                            format!("Resources for {}", cycle.build_waiting_for),
                            now + cycle.build_resource_wait,
                            "building",
                        )
                        .await;
                }

                if config.farming.enabled && !cycle.manager_ok.iter().any(|(name, ok)| name == "farming" && !ok) {
                    let next_farm = now + 1200.0;
                    self.runtimes.entry(village_id).or_default().next_farm_time = next_farm;
                    self.dispatch.panel.set_timer("farm_next", "Next Farm Run", next_farm, "farming").await;
                }

                (cycle.build_resource_wait, cycle.build_queue_finish_ts)
            }
            Err(BotError::SessionExpired) => {
                warn!(village = village_id, "session expired");
                self.dispatch.panel.add_log("Session expired, re-logging in...", "warn").await;
                self.dispatch.panel.set_bot_state("stopped").await;
                (0.0, 0.0)
            }
            Err(BotError::CaptchaRequired) => {
                warn!(village = village_id, "captcha required");
                self.dispatch.panel.add_log("CAPTCHA! Solve it in the browser", "error").await;
                self.dispatch.panel.set_bot_state("paused").await;
                self.dispatch.paused.store(true, Ordering::SeqCst);
                (0.0, 0.0)
            }
            Err(BotError::ProtectionDetected(pattern)) => {
                warn!(village = village_id, pattern, "bot protection detected mid-cycle");
                self.dispatch.protection_detected.store(true, Ordering::SeqCst);
                self.dispatch.panel.set_bot_protection(true, &pattern).await;
                self.dispatch.panel.add_log(format!("Bot protection: {pattern}"), "error").await;
                (0.0, 0.0)
            }
            Err(err) => {
                error!(village = village_id, error = %err, "village cycle error");
                self.dispatch.panel.add_log(format!("Village error: {err}"), "error").await;
                // Unrecognized errors get a fixed cooldown rather than
                // falling straight back into the per-village wait — a
                // URL check here catches protection the periodic monitor
                // hasn't polled yet.
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                let url = self.driver.lock().await.current_url().await;
                if let Ok(url) = url {
                    if let Some(pattern) = protection::check_url(&url) {
                        warn!(village = village_id, pattern, "bot protection detected via fallback url check");
                        self.dispatch.protection_detected.store(true, Ordering::SeqCst);
                        self.dispatch.panel.set_bot_protection(true, pattern).await;
                        self.dispatch.panel.add_log(format!("Bot protection: {pattern}"), "error").await;
                    }
                }
                (0.0, 0.0)
            }
        }
    }

    async fn sync_build_queue_from_panel(&mut self, village_id: u64) {
        let steps = self.dispatch.panel.build_queue(village_id).await;
        if steps.is_empty() {
            return;
        }
        let build_steps: Vec<BuildStep> =
            steps.into_iter().map(|(building, level)| BuildStep { building, level }).collect();
        self.building.set_mode(BuildMode::Sequential(build_steps));
    }

    async fn auto_remove_completed_steps(&mut self, village_id: u64, levels: &HashMap<String, i32>) {
        self.dispatch.panel.set_building_levels(village_id, levels.clone()).await;

        let steps = self.dispatch.panel.build_queue(village_id).await;
        if steps.is_empty() {
            return;
        }
        let original_len = steps.len();
        let remaining: Vec<(String, i32)> =
            steps.into_iter().filter(|(building, level)| levels.get(building).copied().unwrap_or(0) < *level).collect();

        if remaining.len() < original_len {
            let removed = original_len - remaining.len();
            self.dispatch.panel.set_build_queue(village_id, remaining).await;
            if let Err(err) = self.dispatch.save_build_queues().await {
                warn!(error = %err, "build queue save failed");
            }
            info!(village = village_id, removed, "build steps auto-removed");
            self.dispatch.panel.add_log(format!("Removed {removed} completed build step(s)"), "info").await;
        }
    }

    /// Sleep for `duration`, but wake early if `dispatch.wake` fires —
    /// notified by `ActionDispatcher::apply_action` whenever an HTTP/WS
    /// handler mutates state directly, so a `stop`/`pause` issued mid-sleep
    /// takes effect immediately instead of waiting out the whole interval.
    async fn sleep_interruptible(&mut self, duration: std::time::Duration) {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                _ = self.dispatch.wake.notified() => {}
                _ = self.cancel.cancelled() => break,
            }
            if !self.dispatch.running.load(Ordering::SeqCst)
                || self.dispatch.paused.load(Ordering::SeqCst)
                || self.cancel.is_cancelled()
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn humanizer() -> Humanizer {
        Humanizer::new(crate::config::HumanizerConfig {
            delay_range: (1.0, 2.0),
            jitter_factor: 0.1,
            long_pause_chance: 0.0,
            long_pause_range: (5.0, 10.0),
        })
    }

    #[test]
    fn active_hours_window_includes_boundaries() {
        assert!(is_active_hours("00:00-23:59"));
    }

    #[test]
    fn unparseable_active_hours_defaults_to_active() {
        assert!(is_active_hours("not a window"));
    }

    #[test]
    fn wake_up_discards_events_under_thirty_seconds() {
        let h = humanizer();
        let (wake, event) = compute_wake_up(10.0, 20.0, 5.0, 15.0, &h, (100, 100));
        assert_eq!(event, None);
        assert!((wake - 100.0).abs() < 5.0);
    }

    #[test]
    fn wake_up_picks_earliest_qualifying_event() {
        let h = humanizer();
        let (wake, event) = compute_wake_up(500.0, 60.0, f64::INFINITY, f64::INFINITY, &h, (100, 100));
        assert_eq!(event, Some("build_queue"));
        assert!(wake >= 60.0 && wake <= 90.0);
    }

    fn test_dispatcher(paused: bool) -> ActionDispatcher {
        ActionDispatcher {
            config: Arc::new(RwLock::new(AppConfig::default())),
            panel: Arc::new(PanelStateStore::new()),
            projection: Arc::new(PanelProjection::new()),
            running: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(paused)),
            protection_detected: Arc::new(AtomicBool::new(false)),
            protection_resolve: Arc::new(Notify::new()),
            wake: Arc::new(Notify::new()),
            data_dir: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn dispatcher_start_clears_paused_and_sets_bot_state() {
        let dispatch = test_dispatcher(true);
        dispatch.apply_action(Action::Start).await;
        assert!(!dispatch.paused.load(Ordering::SeqCst));
        assert_eq!(dispatch.panel.bot_state().await, "running");
    }

    #[tokio::test]
    async fn dispatcher_village_toggle_resolves_tristate() {
        let dispatch = test_dispatcher(false);
        dispatch
            .apply_action(Action::VillageToggle { village_id: 7, feature: "farming".to_string(), value: TriState::Off })
            .await;
        let config = dispatch.config.read().await;
        assert_eq!(config.village_overrides.get("7").unwrap().farming, FeatureOverride::Disabled);
    }

    #[tokio::test]
    async fn dispatcher_bot_protection_resolved_notifies_without_touching_panel() {
        let dispatch = test_dispatcher(false);
        dispatch.panel.set_bot_protection(true, "url_bot_check").await;
        dispatch.apply_action(Action::BotProtectionResolved).await;
        // ActionDispatcher defers the actual clear to protection::run_periodic;
        // it only wakes that task up.
        assert!(dispatch.panel.snapshot().await.bot_protection_detected);
    }
}
