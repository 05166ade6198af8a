//! `PanelStateStore` — the single source of truth for everything the web
//! panel shows. Owned by the Orchestrator, snapshotted to JSON for the
//! initial WS payload, mutated in place as cycles run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

const MAX_LOG_ENTRIES: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: f64,
    pub message: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerState {
    pub label: String,
    pub end_ts: f64,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VillageStatus {
    pub village_id: u64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub points: i64,
    pub wood: i64,
    pub stone: i64,
    pub iron: i64,
    pub storage: i64,
    pub population: i64,
    pub max_population: i64,
    pub incoming: i64,
    pub wood_rate: i64,
    pub stone_rate: i64,
    pub iron_rate: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VillageConfig {
    pub building: Option<bool>,
    pub farming: Option<bool>,
    pub scavenging: Option<bool>,
    pub troops: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScavengeTroopConfig {
    pub enabled: bool,
    pub reserve: i64,
}

/// All panel state, serialized wholesale on WS connect and patched
/// incrementally afterward by typed event emission at the call sites.
#[derive(Debug, Default, Serialize)]
pub struct PanelState {
    pub logs: Vec<LogEntry>,
    pub timers: HashMap<String, TimerState>,
    pub village_statuses: HashMap<u64, VillageStatus>,
    pub village_configs: HashMap<u64, VillageConfig>,
    pub village_ids: Vec<u64>,
    pub active_village_id: u64,
    pub bot_state: String,
    pub toggle_states: HashMap<String, bool>,
    pub active_tab: String,
    pub troops_mode_label: String,
    pub log_filter: String,
    pub build_queues: HashMap<String, Vec<(String, i32)>>,
    pub building_levels: HashMap<String, HashMap<String, i32>>,
    pub farm_lc_threshold: u32,
    pub scavenge_troops: HashMap<String, ScavengeTroopConfig>,
    pub bot_protection_detected: bool,
    pub bot_protection_pattern: String,
    pub fill_unit: String,
}

impl PanelState {
    pub fn new() -> Self {
        Self { bot_state: "stopped".to_string(), active_tab: "dashboard".to_string(), log_filter: "all".to_string(), fill_unit: "spear".to_string(), farm_lc_threshold: 20, ..Default::default() }
    }
}

/// Thread-safe handle shared between the Orchestrator, HTTP handlers, and
/// the WS broadcast task.
pub struct PanelStateStore {
    inner: RwLock<PanelState>,
}

impl PanelStateStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(PanelState::new()) }
    }

    pub async fn snapshot(&self) -> PanelState {
        let guard = self.inner.read().await;
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        let timers = guard.timers.iter().filter(|(_, timer)| timer.end_ts > now).map(|(id, timer)| (id.clone(), timer.clone())).collect();
        PanelState {
            logs: guard.logs.clone(),
            timers,
            village_statuses: guard.village_statuses.clone(),
            village_configs: guard.village_configs.clone(),
            village_ids: guard.village_ids.clone(),
            active_village_id: guard.active_village_id,
            bot_state: guard.bot_state.clone(),
            toggle_states: guard.toggle_states.clone(),
            active_tab: guard.active_tab.clone(),
            troops_mode_label: guard.troops_mode_label.clone(),
            log_filter: guard.log_filter.clone(),
            build_queues: guard.build_queues.clone(),
            building_levels: guard.building_levels.clone(),
            farm_lc_threshold: guard.farm_lc_threshold,
            scavenge_troops: guard.scavenge_troops.clone(),
            bot_protection_detected: guard.bot_protection_detected,
            bot_protection_pattern: guard.bot_protection_pattern.clone(),
            fill_unit: guard.fill_unit.clone(),
        }
    }

    pub async fn add_log(&self, message: impl Into<String>, level: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.logs.push(LogEntry {
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            message: message.into(),
            level: level.into(),
        });
        let len = guard.logs.len();
        if len > MAX_LOG_ENTRIES {
            guard.logs.drain(0..len - MAX_LOG_ENTRIES);
        }
    }

    pub async fn set_timer(&self, id: impl Into<String>, label: impl Into<String>, end_ts: f64, category: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.timers.insert(id.into(), TimerState { label: label.into(), end_ts, category: category.into() });
    }

    pub async fn clear_timer(&self, id: &str) {
        let mut guard = self.inner.write().await;
        guard.timers.remove(id);
    }

    pub async fn set_bot_state(&self, state: impl Into<String>) {
        self.inner.write().await.bot_state = state.into();
    }

    pub async fn bot_state(&self) -> String {
        self.inner.read().await.bot_state.clone()
    }

    pub async fn set_toggle(&self, feature: &str, enabled: bool) {
        self.inner.write().await.toggle_states.insert(feature.to_string(), enabled);
    }

    pub async fn toggle_states(&self) -> HashMap<String, bool> {
        self.inner.read().await.toggle_states.clone()
    }

    pub async fn set_village_status(&self, status: VillageStatus) {
        self.inner.write().await.village_statuses.insert(status.village_id, status);
    }

    pub async fn set_village_ids(&self, ids: Vec<u64>) {
        self.inner.write().await.village_ids = ids;
    }

    pub async fn set_bot_protection(&self, detected: bool, pattern: &str) {
        let mut guard = self.inner.write().await;
        guard.bot_protection_detected = detected;
        guard.bot_protection_pattern = pattern.to_string();
    }

    pub async fn set_build_queue(&self, village_id: u64, steps: Vec<(String, i32)>) {
        self.inner.write().await.build_queues.insert(village_id.to_string(), steps);
    }

    pub async fn build_queues(&self) -> HashMap<String, Vec<(String, i32)>> {
        self.inner.read().await.build_queues.clone()
    }

    pub async fn build_queue(&self, village_id: u64) -> Vec<(String, i32)> {
        self.inner.read().await.build_queues.get(&village_id.to_string()).cloned().unwrap_or_default()
    }

    pub async fn set_all_build_queues(&self, queues: HashMap<String, Vec<(String, i32)>>) {
        self.inner.write().await.build_queues = queues;
    }

    pub async fn set_building_levels(&self, village_id: u64, levels: HashMap<String, i32>) {
        self.inner.write().await.building_levels.insert(village_id.to_string(), levels);
    }

    pub async fn set_active_village(&self, village_id: u64) {
        self.inner.write().await.active_village_id = village_id;
    }

    pub async fn set_active_tab(&self, tab: impl Into<String>) {
        self.inner.write().await.active_tab = tab.into();
    }

    pub async fn set_log_filter(&self, filter: impl Into<String>) {
        self.inner.write().await.log_filter = filter.into();
    }

    pub async fn set_village_config(&self, village_id: u64, config: VillageConfig) {
        self.inner.write().await.village_configs.insert(village_id, config);
    }

    pub async fn set_farm_lc_threshold(&self, threshold: u32) {
        self.inner.write().await.farm_lc_threshold = threshold;
    }

    pub async fn farm_lc_threshold(&self) -> u32 {
        self.inner.read().await.farm_lc_threshold
    }

    pub async fn set_scavenge_troop(&self, unit: &str, enabled: Option<bool>, reserve: Option<i64>) {
        let mut guard = self.inner.write().await;
        let entry = guard
            .scavenge_troops
            .entry(unit.to_string())
            .or_insert(ScavengeTroopConfig { enabled: true, reserve: 0 });
        if let Some(enabled) = enabled {
            entry.enabled = enabled;
        }
        if let Some(reserve) = reserve {
            entry.reserve = reserve;
        }
    }

    pub async fn set_fill_unit(&self, unit: impl Into<String>) {
        self.inner.write().await.fill_unit = unit.into();
    }

    pub async fn fill_unit(&self) -> String {
        self.inner.read().await.fill_unit.clone()
    }
}

impl Default for PanelStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Loggable timestamp helper for panel entries that track real-world
/// wall-clock moments rather than monotonic durations.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}
