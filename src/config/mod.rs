//! Configuration: TOML-backed [`AppConfig`], per-village feature overrides,
//! and the process-wide [`WorldConfig`] singleton.
//!
//! `WorldConfig` is fetched once from the game at startup and never changes
//! for the lifetime of the process, so it lives in a process-wide `OnceLock`.
//! `AppConfig` is mutable at runtime (toggles, thresholds) and is owned by
//! the orchestrator, never global.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use crate::models::WorldConfig;

static WORLD: OnceLock<WorldConfig> = OnceLock::new();

/// Install the world configuration. Called once during startup, after the
/// world's speed/unit-carry data has been fetched. A second call is a
/// startup bug, not a fatal one: it's logged and ignored.
pub fn init_world(world: WorldConfig) {
    if WORLD.set(world).is_err() {
        tracing::warn!("world config already initialized, ignoring second init");
    }
}

/// Borrow the world configuration.
///
/// # Panics
/// Panics if called before [`init_world`]. Missing world config is a fatal
/// startup error, not a recoverable condition.
pub fn world() -> &'static WorldConfig {
    WORLD
        .get()
        .expect("config::world() called before config::init_world() — startup bug")
}

#[cfg(test)]
pub fn world_is_initialized() -> bool {
    WORLD.get().is_some()
}

/// Three-valued per-village feature override. Wire-compatible with a plain
/// TOML `true`/`false`/absent key, but represented as a real sum type
/// instead of `Option<bool>` so call sites can't accidentally confuse "not
/// set" with "explicitly off."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureOverride {
    #[default]
    Inherit,
    Enabled,
    Disabled,
}

impl FeatureOverride {
    pub fn resolve(self, global: bool) -> bool {
        match self {
            FeatureOverride::Inherit => global,
            FeatureOverride::Enabled => true,
            FeatureOverride::Disabled => false,
        }
    }
}

impl Serialize for FeatureOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeatureOverride::Inherit => serializer.serialize_none(),
            FeatureOverride::Enabled => serializer.serialize_bool(true),
            FeatureOverride::Disabled => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for FeatureOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let opt = Option::<bool>::deserialize(deserializer)?;
        Ok(match opt {
            None => FeatureOverride::Inherit,
            Some(true) => FeatureOverride::Enabled,
            Some(false) => FeatureOverride::Disabled,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub world: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { world: "de220".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlessMode {
    Headed,
    Headless,
    Xvfb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless_mode: HeadlessMode,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self { headless_mode: HeadlessMode::Headed, viewport_width: 1280, viewport_height: 720 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub active_hours: String,
    pub active_delay: (u64, u64),
    pub inactive_delay: (u64, u64),
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            active_hours: "06:00-23:00".to_string(),
            active_delay: (120, 300),
            inactive_delay: (600, 1200),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    pub enabled: bool,
    pub template: String,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self { enabled: true, template: "templates/offensive.toml".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmTemplate {
    pub spear: i64,
    pub sword: i64,
    pub axe: i64,
    pub archer: i64,
    pub light: i64,
    pub heavy: i64,
    pub ram: i64,
    pub catapult: i64,
    pub knight: i64,
    pub snob: i64,
}

impl Default for FarmTemplate {
    fn default() -> Self {
        Self {
            spear: 0, sword: 0, axe: 0, archer: 0, light: 0,
            heavy: 0, ram: 0, catapult: 0, knight: 0, snob: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmingConfig {
    pub enabled: bool,
    pub radius: u32,
    pub template_a: FarmTemplate,
    pub template_b: FarmTemplate,
    pub stop_on_attack: bool,
    pub min_reserve: HashMap<String, i64>,
    /// Max loot-per-capacity (LC) before falling back to template A.
    pub lc_threshold: u32,
}

impl Default for FarmingConfig {
    fn default() -> Self {
        let mut min_reserve = HashMap::new();
        min_reserve.insert("spear".to_string(), 50);
        Self {
            enabled: true,
            radius: 15,
            template_a: FarmTemplate { spear: 10, light: 5, ..Default::default() },
            template_b: FarmTemplate { spear: 25, sword: 15, light: 10, ram: 2, ..Default::default() },
            stop_on_attack: true,
            min_reserve,
            lc_threshold: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScavengingConfig {
    pub enabled: bool,
    /// `ratio` (primary), or one of the legacy modes: `time_based`,
    /// `max_efficiency`, `send_all`.
    pub mode: String,
    pub target_minutes: u32,
    /// Scavenge tier (as a string key, e.g. `"1"`) -> ratio. TOML tables
    /// require string keys; parse to `i32` at the call site.
    pub option_ratios: HashMap<String, f64>,
    pub dry_run: bool,
    /// Units excluded from scavenging. All excluded by default; the panel
    /// enables them per-unit.
    pub scavenge_exclude: Vec<String>,
    pub scavenge_reserve: HashMap<String, i64>,
}

impl Default for ScavengingConfig {
    fn default() -> Self {
        let mut option_ratios = HashMap::new();
        option_ratios.insert("1".to_string(), 2.5);
        option_ratios.insert("2".to_string(), 1.0);
        Self {
            enabled: true,
            mode: "time_based".to_string(),
            target_minutes: 120,
            option_ratios,
            dry_run: false,
            scavenge_exclude: vec![
                "spear".into(), "sword".into(), "axe".into(),
                "archer".into(), "light".into(), "marcher".into(), "heavy".into(),
            ],
            scavenge_reserve: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TroopsConfig {
    pub enabled: bool,
    /// `targets` or `fill_scavenge`.
    pub mode: String,
    pub fill_units: Vec<String>,
    pub targets: HashMap<String, i64>,
}

impl Default for TroopsConfig {
    fn default() -> Self {
        let mut targets = HashMap::new();
        targets.insert("spear".to_string(), 500);
        targets.insert("sword".to_string(), 300);
        targets.insert("light".to_string(), 200);
        targets.insert("ram".to_string(), 50);
        Self { enabled: true, mode: "targets".to_string(), fill_units: vec!["spear".into()], targets }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizerConfig {
    pub delay_range: (f64, f64),
    pub jitter_factor: f64,
    pub long_pause_chance: f64,
    pub long_pause_range: (f64, f64),
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            delay_range: (3.0, 8.0),
            jitter_factor: 0.3,
            long_pause_chance: 0.05,
            long_pause_range: (15.0, 45.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub alert_cooldown: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: String::new(), chat_id: String::new(), alert_cooldown: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotProtectionConfig {
    pub check_interval: u64,
    pub extra_selectors: Vec<String>,
}

impl Default for BotProtectionConfig {
    fn default() -> Self {
        Self { check_interval: 30, extra_selectors: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VillageOverride {
    pub building: FeatureOverride,
    pub farming: FeatureOverride,
    pub scavenging: FeatureOverride,
    pub troops: FeatureOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: false, host: "0.0.0.0".to_string(), port: 8000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub bot: BotConfig,
    pub building: BuildingConfig,
    pub farming: FarmingConfig,
    pub scavenging: ScavengingConfig,
    pub troops: TroopsConfig,
    pub humanizer: HumanizerConfig,
    pub telegram: TelegramConfig,
    pub bot_protection: BotProtectionConfig,
    pub api: ApiConfig,
    /// Village ID (as a string key) -> per-village feature override. TOML
    /// tables require string keys; parse to `u64` at the call site.
    pub village_overrides: HashMap<String, VillageOverride>,
}

/// Resolve whether `feature` ("building" | "farming" | "scavenging" |
/// "troops") is enabled for `village_id`: per-village override first, then
/// the global section's `enabled` flag.
pub fn is_feature_enabled(config: &AppConfig, village_id: u64, feature: &str) -> bool {
    let global = match feature {
        "building" => config.building.enabled,
        "farming" => config.farming.enabled,
        "scavenging" => config.scavenging.enabled,
        "troops" => config.troops.enabled,
        _ => return false,
    };
    let Some(override_) = config.village_overrides.get(&village_id.to_string()) else {
        return global;
    };
    let feature_override = match feature {
        "building" => override_.building,
        "farming" => override_.farming,
        "scavenging" => override_.scavenging,
        "troops" => override_.troops,
        _ => FeatureOverride::Inherit,
    };
    feature_override.resolve(global)
}

/// Load configuration from a TOML file, falling back to defaults if it
/// doesn't exist.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {path:?}"))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file: {path:?}"))
}

/// Save configuration back to TOML, creating parent directories as needed.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {parent:?}"))?;
    }
    let rendered = toml::to_string_pretty(config).context("failed to render config as TOML")?;
    std::fs::write(path, rendered).with_context(|| format!("failed to write config file: {path:?}"))
}

/// Load a sequential building-order template. Returns building name ->
/// target level, in declared order.
pub fn load_building_template(path: &Path) -> Result<Vec<(String, i32)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read building template: {path:?}"))?;
    let doc: toml::Value = toml::from_str(&raw)
        .with_context(|| format!("failed to parse building template: {path:?}"))?;
    let Some(buildings) = doc.get("buildings").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };
    let mut steps = Vec::new();
    for entry in buildings {
        let building = entry.get("building").and_then(|v| v.as_str()).unwrap_or_default();
        let level = entry.get("level").and_then(|v| v.as_integer()).unwrap_or(0) as i32;
        steps.push((building.to_string(), level));
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_resolution_prefers_village_override() {
        let mut config = AppConfig::default();
        config.building.enabled = true;
        config.village_overrides.insert(
            "7".to_string(),
            VillageOverride { building: FeatureOverride::Disabled, ..Default::default() },
        );
        assert!(!is_feature_enabled(&config, 7, "building"));
        assert!(is_feature_enabled(&config, 8, "building"));
    }

    #[test]
    fn feature_override_round_trips_through_toml() {
        let mut village_overrides = HashMap::new();
        village_overrides.insert(
            "1".to_string(),
            VillageOverride { farming: FeatureOverride::Enabled, ..Default::default() },
        );
        let config = AppConfig { village_overrides, ..Default::default() };
        let rendered = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.village_overrides["1"].farming, FeatureOverride::Enabled);
        assert_eq!(parsed.village_overrides["1"].building, FeatureOverride::Inherit);
    }
}
