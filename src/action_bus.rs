//! Typed command plane: inbound panel/HTTP/WebSocket actions are parsed
//! into a single tagged enum rather than dispatched through a
//! string-keyed handler map.

use tracing::warn;

/// Three-valued per-village feature toggle as it arrives over the wire:
/// `"null"` means inherit, anything else is `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Inherit,
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BqDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Pause,
    Stop,
    ToggleBuilding(bool),
    ToggleFarming(bool),
    ToggleScavenging(bool),
    ToggleTroops(bool),
    TabSwitch(String),
    LogFilter(String),
    SelectVillage(u64),
    VillageToggle { village_id: u64, feature: String, value: TriState },
    FarmThreshold(u32),
    BqAdd { village_id: u64, building: String, level: i32 },
    BqRemove { village_id: u64, index: usize },
    BqMove { village_id: u64, index: usize, direction: BqDirection },
    BqClear,
    ScavTroop { unit: String, enabled: Option<bool>, reserve: Option<i64> },
    FillUnit(String),
    BotProtectionResolved,
}

/// Parse an `(action, value)` pair from the wire into a typed [`Action`].
/// Returns `None` for an unrecognized action or malformed payload; callers
/// log and drop rather than treat it as an error.
pub fn parse(action: &str, value: &str) -> Option<Action> {
    match action {
        "start" => Some(Action::Start),
        "pause" => Some(Action::Pause),
        "stop" => Some(Action::Stop),
        "toggle_building" => Some(Action::ToggleBuilding(value == "true")),
        "toggle_farming" => Some(Action::ToggleFarming(value == "true")),
        "toggle_scavenging" => Some(Action::ToggleScavenging(value == "true")),
        "toggle_troops" => Some(Action::ToggleTroops(value == "true")),
        "tab_switch" => Some(Action::TabSwitch(value.to_string())),
        "log_filter" => Some(Action::LogFilter(value.to_string())),
        "select_village" => value.parse().ok().map(Action::SelectVillage),
        "village_toggle" => {
            let parts: Vec<&str> = value.split(':').collect();
            if parts.len() != 3 {
                return None;
            }
            let village_id = parts[0].parse().ok()?;
            let feature = parts[1].to_string();
            let value = match parts[2] {
                "null" => TriState::Inherit,
                "true" => TriState::On,
                _ => TriState::Off,
            };
            Some(Action::VillageToggle { village_id, feature, value })
        }
        "farm_threshold" => {
            let threshold: u32 = value.parse().ok()?;
            (1..=100).contains(&threshold).then_some(Action::FarmThreshold(threshold))
        }
        "bq_add" => {
            let parts: Vec<&str> = value.split(':').collect();
            if parts.len() != 3 {
                return None;
            }
            let village_id = parts[0].parse().ok()?;
            let building = parts[1].to_string();
            let level: i32 = parts[2].parse().ok()?;
            (1..=30).contains(&level).then_some(Action::BqAdd { village_id, building, level })
        }
        "bq_remove" => {
            let parts: Vec<&str> = value.split(':').collect();
            if parts.len() != 2 {
                return None;
            }
            let village_id = parts[0].parse().ok()?;
            let index = parts[1].parse().ok()?;
            Some(Action::BqRemove { village_id, index })
        }
        "bq_move" => {
            let parts: Vec<&str> = value.split(':').collect();
            if parts.len() != 3 {
                return None;
            }
            let village_id = parts[0].parse().ok()?;
            let index = parts[1].parse().ok()?;
            let direction = match parts[2] {
                "up" => BqDirection::Up,
                "down" => BqDirection::Down,
                _ => return None,
            };
            Some(Action::BqMove { village_id, index, direction })
        }
        "bq_clear" => Some(Action::BqClear),
        "scav_troop" => {
            let parts: Vec<&str> = value.split(':').collect();
            if parts.len() != 3 {
                return None;
            }
            let unit = parts[0].to_string();
            match parts[1] {
                "enabled" => Some(Action::ScavTroop { unit, enabled: Some(parts[2] == "true"), reserve: None }),
                "reserve" => {
                    let reserve: i64 = parts[2].parse().ok()?;
                    (reserve >= 0).then_some(Action::ScavTroop { unit, enabled: None, reserve: Some(reserve) })
                }
                _ => None,
            }
        }
        "fill_unit" => {
            const VALID: [&str; 4] = ["spear", "sword", "axe", "archer"];
            VALID.contains(&value).then(|| Action::FillUnit(value.to_string()))
        }
        "bot_protection_resolved" => Some(Action::BotProtectionResolved),
        other => {
            warn!(action = other, "unknown action bus command");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn village_toggle_parses_three_states() {
        assert_eq!(
            parse("village_toggle", "7:building:null"),
            Some(Action::VillageToggle { village_id: 7, feature: "building".to_string(), value: TriState::Inherit })
        );
        assert_eq!(
            parse("village_toggle", "7:building:true"),
            Some(Action::VillageToggle { village_id: 7, feature: "building".to_string(), value: TriState::On })
        );
    }

    #[test]
    fn farm_threshold_rejects_out_of_range() {
        assert_eq!(parse("farm_threshold", "0"), None);
        assert_eq!(parse("farm_threshold", "101"), None);
        assert_eq!(parse("farm_threshold", "50"), Some(Action::FarmThreshold(50)));
    }

    #[test]
    fn unknown_action_returns_none() {
        assert_eq!(parse("does_not_exist", ""), None);
    }

    #[test]
    fn fill_unit_validates_against_allowed_set() {
        assert_eq!(parse("fill_unit", "spy"), None);
        assert_eq!(parse("fill_unit", "axe"), Some(Action::FillUnit("axe".to_string())));
    }
}
