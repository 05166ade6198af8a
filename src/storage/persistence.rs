//! Build-queue and toggle-state persistence: small JSON files under the
//! profile's data directory, read once at startup and rewritten whenever
//! the in-memory state they mirror changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BUILD_QUEUES_FILE: &str = "build_queues.json";
const TOGGLE_STATES_FILE: &str = "toggle_states.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildQueueStep {
    pub building: String,
    pub level: i32,
}

fn build_queues_path(data_dir: &Path) -> PathBuf {
    data_dir.join(BUILD_QUEUES_FILE)
}

fn toggle_states_path(data_dir: &Path) -> PathBuf {
    data_dir.join(TOGGLE_STATES_FILE)
}

/// Load persisted build queues, keyed by village ID. A missing file is not
/// an error — it means no queue has ever been saved.
pub fn load_build_queues(data_dir: &Path) -> Result<HashMap<u64, Vec<BuildQueueStep>>> {
    let path = build_queues_path(data_dir);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {path:?}"))?;
    let by_string: HashMap<String, Vec<BuildQueueStep>> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {path:?}"))?;
    Ok(by_string
        .into_iter()
        .filter_map(|(vid, steps)| vid.parse::<u64>().ok().map(|vid| (vid, steps)))
        .collect())
}

/// Persist build queues, writing string keys since JSON object keys must
/// be strings.
pub fn save_build_queues(data_dir: &Path, queues: &HashMap<u64, Vec<BuildQueueStep>>) -> Result<()> {
    std::fs::create_dir_all(data_dir).with_context(|| format!("failed to create {data_dir:?}"))?;
    let by_string: HashMap<String, &Vec<BuildQueueStep>> =
        queues.iter().map(|(vid, steps)| (vid.to_string(), steps)).collect();
    let body = serde_json::to_string_pretty(&by_string).context("failed to serialize build queues")?;
    let path = build_queues_path(data_dir);
    write_atomic(&path, &body)
}

/// Load persisted feature toggle states. A missing or unparseable file
/// falls back to an empty map rather than failing startup.
pub fn load_toggle_states(data_dir: &Path) -> HashMap<String, bool> {
    let path = toggle_states_path(data_dir);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return HashMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

pub fn save_toggle_states(data_dir: &Path, states: &HashMap<String, bool>) -> Result<()> {
    std::fs::create_dir_all(data_dir).with_context(|| format!("failed to create {data_dir:?}"))?;
    let body = serde_json::to_string_pretty(states).context("failed to serialize toggle states")?;
    let path = toggle_states_path(data_dir);
    write_atomic(&path, &body)
}

/// Write via a temp file + rename so a crash mid-write never leaves a
/// truncated or partially-written state file behind.
fn write_atomic(path: &Path, body: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, body).with_context(|| format!("failed to write {tmp_path:?}"))?;
    std::fs::rename(&tmp_path, path).with_context(|| format!("failed to rename {tmp_path:?} -> {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_build_queue_file_returns_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_build_queues(dir.path()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn build_queues_round_trip_through_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut queues = HashMap::new();
        queues.insert(12345, vec![BuildQueueStep { building: "wood".to_string(), level: 5 }]);
        save_build_queues(dir.path(), &queues).unwrap();

        let loaded = load_build_queues(dir.path()).unwrap();
        assert_eq!(loaded.get(&12345).unwrap()[0].building, "wood");
    }

    #[test]
    fn toggle_states_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut states = HashMap::new();
        states.insert("building".to_string(), false);
        save_toggle_states(dir.path(), &states).unwrap();
        assert_eq!(load_toggle_states(dir.path()), states);
    }

    #[test]
    fn missing_toggle_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_toggle_states(dir.path()).is_empty());
    }
}
