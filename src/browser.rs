//! External collaborator contracts.
//!
//! `BrowserDriver` and `Extractor` are deliberately out of scope for this
//! crate — real browser automation and page scraping live elsewhere. These
//! traits exist so the planners, pipeline, and orchestrator can be written
//! and tested against the *shape* of the collaboration without depending on
//! a concrete browser backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BotResult;
use crate::models::{BuildQueueEntry, Resources, TrainQueue, TroopCounts, Village, WorldConfig};

/// Minimal surface a real browser-automation backend must provide. All
/// calls that touch the actual game go through one driver instance, shared
/// behind a mutex so two villages' actions never interleave mid-request.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to a screen within a village (e.g. `"overview"`,
    /// `"place"` for rally point, `"am_farm"` for the farm assistant).
    async fn navigate(&self, village_id: u64, screen: &str) -> BotResult<()>;

    /// Current page URL, used by the protection monitor's URL-substring
    /// check and by error-path protection re-checks.
    async fn current_url(&self) -> BotResult<String>;

    /// Whether any element matching `selector` is present in the live DOM.
    /// Backs the protection monitor's CSS-selector patterns.
    async fn selector_present(&self, selector: &str) -> BotResult<bool>;

    /// Submit a raw form action (building upgrade, troop training, scavenge
    /// dispatch, ...). `payload` is backend-specific (form fields, request
    /// body) and opaque to this crate.
    async fn submit(&self, action: &str, payload: Value) -> BotResult<()>;
}

/// Scavenge screen snapshot: which option slots are unlocked, which are
/// currently running a squad, the village's idle troops, and each running
/// tier's return timestamp (epoch seconds).
#[derive(Debug, Clone, Default)]
pub struct ScavengeState {
    pub unlocked_tiers: Vec<i32>,
    pub running_tiers: Vec<i32>,
    pub idle_troops: TroopCounts,
    pub return_times: HashMap<i32, f64>,
}

/// Building screen snapshot: the live queue and current levels.
#[derive(Debug, Clone, Default)]
pub struct BuildingQueueState {
    pub queue: Vec<BuildQueueEntry>,
    pub levels: HashMap<String, i32>,
}

/// Barracks/stable training-tab snapshot for fill-scavenge batch sizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingInfo {
    pub available: bool,
    pub queue_seconds: f64,
    pub train_time: f64,
    pub max_affordable: i64,
}

/// A row on the farm-assistant page: a candidate target with its estimated
/// haul (sum of resource fields shown in the row, `None` if unparseable).
#[derive(Debug, Clone, Copy)]
pub struct FarmRow {
    pub target_id: u64,
    pub estimated_haul: Option<i64>,
}

/// Minimal surface for pulling structured data back out of whatever the
/// driver is currently looking at.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn village(&self, village_id: u64) -> BotResult<Village>;
    async fn world_config(&self) -> BotResult<WorldConfig>;

    /// Village IDs owned by the account, discovered from the overview
    /// screen. `seed_village_id` is a known-good starting village.
    async fn village_ids(&self, seed_village_id: u64) -> BotResult<Vec<u64>>;

    async fn scavenge_state(&self, village_id: u64) -> BotResult<ScavengeState>;
    async fn building_queue(&self, village_id: u64) -> BotResult<BuildingQueueState>;
    async fn building_cost(
        &self,
        village_id: u64,
        building: &str,
        target_level: i32,
    ) -> BotResult<Resources>;
    async fn troop_counts(&self, village_id: u64) -> BotResult<TroopCounts>;
    async fn training_info(&self, village_id: u64, unit: &str) -> BotResult<TrainingInfo>;

    /// Outstanding entries in `building`'s ("barracks" | "stable") training
    /// queue.
    async fn train_queue(&self, village_id: u64, building: &str) -> BotResult<Vec<TrainQueue>>;

    /// Farm-assistant target rows, in page order.
    async fn farm_targets(&self, village_id: u64) -> BotResult<Vec<FarmRow>>;

    /// Whether `target_id`'s template-`template` button is still clickable
    /// after a submit — used to detect troop exhaustion.
    async fn farm_button_enabled(&self, village_id: u64, target_id: u64, template: &str) -> BotResult<bool>;

    /// Parse a farm report's loot. `None` means the haul could not be
    /// parsed; callers fall back to the conservative template rather than
    /// treating an unparseable report as zero loot.
    async fn parse_haul(&self, report_id: u64) -> BotResult<Option<Resources>>;

    /// New battle reports since the last call, in the report list's order.
    async fn report_list(&self, village_id: u64) -> BotResult<Vec<crate::reports::ReportSummary>>;
}

/// Placeholder used when no concrete browser backend is wired in. Every
/// call fails with `TransportTransient`, which the Orchestrator's
/// fail-safety policy already handles (log, sleep 30s, retry) — this lets
/// the binary link and the panel/API run standalone for control and
/// inspection without a real automation backend present.
pub struct UnconfiguredDriver;

#[async_trait]
impl BrowserDriver for UnconfiguredDriver {
    async fn navigate(&self, _village_id: u64, _screen: &str) -> BotResult<()> {
        Err(crate::error::BotError::TransportTransient("no browser backend configured".into()))
    }

    async fn current_url(&self) -> BotResult<String> {
        Err(crate::error::BotError::TransportTransient("no browser backend configured".into()))
    }

    async fn selector_present(&self, _selector: &str) -> BotResult<bool> {
        Err(crate::error::BotError::TransportTransient("no browser backend configured".into()))
    }

    async fn submit(&self, _action: &str, _payload: Value) -> BotResult<()> {
        Err(crate::error::BotError::TransportTransient("no browser backend configured".into()))
    }
}

#[async_trait]
impl Extractor for UnconfiguredDriver {
    async fn village(&self, _village_id: u64) -> BotResult<Village> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn world_config(&self) -> BotResult<WorldConfig> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn village_ids(&self, seed_village_id: u64) -> BotResult<Vec<u64>> {
        Ok(vec![seed_village_id])
    }
    async fn scavenge_state(&self, _village_id: u64) -> BotResult<ScavengeState> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn building_queue(&self, _village_id: u64) -> BotResult<BuildingQueueState> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn building_cost(&self, _village_id: u64, _building: &str, _target_level: i32) -> BotResult<Resources> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn troop_counts(&self, _village_id: u64) -> BotResult<TroopCounts> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn training_info(&self, _village_id: u64, _unit: &str) -> BotResult<TrainingInfo> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn train_queue(&self, _village_id: u64, _building: &str) -> BotResult<Vec<TrainQueue>> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn farm_targets(&self, _village_id: u64) -> BotResult<Vec<FarmRow>> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn farm_button_enabled(&self, _village_id: u64, _target_id: u64, _template: &str) -> BotResult<bool> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn parse_haul(&self, _report_id: u64) -> BotResult<Option<Resources>> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
    async fn report_list(&self, _village_id: u64) -> BotResult<Vec<crate::reports::ReportSummary>> {
        Err(crate::error::BotError::Extraction("no browser backend configured".into()))
    }
}
