//! Request handlers for the `/api` surface. Every mutating handler builds
//! a wire-format `(action, value)` pair and hands it to
//! [`crate::action_bus::parse`] — the same parser the WS inbound loop
//! uses — so validation never drifts between the two transports.

use std::path::PathBuf;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::action_bus;
use crate::config::AppConfig;
use crate::orchestrator::ActionDispatcher;

use super::ApiError;

/// Shared state for every handler. Cheap to clone: everything inside is
/// `Arc`-backed or a plain value fixed at startup.
#[derive(Clone)]
pub struct ApiState {
    pub dispatch: ActionDispatcher,
    pub profile: String,
    pub config_path: PathBuf,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(dispatch: ActionDispatcher, profile: String, config_path: PathBuf) -> Self {
        Self { dispatch, profile, config_path, start_time: Instant::now() }
    }
}

#[cfg(test)]
impl ApiState {
    pub fn new_for_test() -> Self {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use tokio::sync::{Notify, RwLock};

        Self::new(
            ActionDispatcher {
                config: Arc::new(RwLock::new(AppConfig::default())),
                panel: Arc::new(crate::panel::PanelStateStore::new()),
                projection: Arc::new(crate::panel::PanelProjection::new()),
                running: Arc::new(AtomicBool::new(true)),
                paused: Arc::new(AtomicBool::new(false)),
                protection_detected: Arc::new(AtomicBool::new(false)),
                protection_resolve: Arc::new(Notify::new()),
                wake: Arc::new(Notify::new()),
                data_dir: std::env::temp_dir(),
            },
            "test".to_string(),
            std::env::temp_dir().join("config.toml"),
        )
    }
}

async fn apply_or_reject(state: &ApiState, action: &str, value: &str) -> Result<(), ApiError> {
    match action_bus::parse(action, value) {
        Some(action) => {
            state.dispatch.apply_action(action).await;
            Ok(())
        }
        None => Err(ApiError::bad_request(format!("invalid {action} payload: {value}"))),
    }
}

pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    let village_ids = state.dispatch.panel.snapshot().await.village_ids;
    Json(json!({
        "status": "ok",
        "bot_state": state.dispatch.panel.bot_state().await,
        "profile": state.profile,
        "villages": village_ids.len(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

pub async fn status(State(state): State<ApiState>) -> Json<Value> {
    Json(serde_json::to_value(state.dispatch.panel.snapshot().await).unwrap_or_default())
}

pub async fn control(
    State(state): State<ApiState>,
    Path(action): Path<String>,
) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, &action, "").await?;
    Ok(Json(json!({ "status": "ok", "bot_state": state.dispatch.panel.bot_state().await })))
}

pub async fn get_toggles(State(state): State<ApiState>) -> Json<Value> {
    Json(serde_json::to_value(state.dispatch.panel.toggle_states().await).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub struct EnabledQuery {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn toggle_feature(
    State(state): State<ApiState>,
    Path(feature): Path<String>,
    Query(query): Query<EnabledQuery>,
) -> Result<Json<Value>, ApiError> {
    let action = format!("toggle_{feature}");
    apply_or_reject(&state, &action, if query.enabled { "true" } else { "false" }).await?;
    Ok(Json(json!({ "feature": feature, "enabled": query.enabled })))
}

pub async fn villages(State(state): State<ApiState>) -> Json<Value> {
    let snapshot = state.dispatch.panel.snapshot().await;
    Json(json!({
        "village_ids": snapshot.village_ids,
        "active_village_id": snapshot.active_village_id,
        "statuses": snapshot.village_statuses,
    }))
}

pub async fn get_build_queue(State(state): State<ApiState>, Path(vid): Path<u64>) -> Json<Value> {
    let snapshot = state.dispatch.panel.snapshot().await;
    Json(json!({
        "village_id": vid,
        "steps": snapshot.build_queues.get(&vid.to_string()).cloned().unwrap_or_default(),
        "levels": snapshot.building_levels.get(&vid.to_string()).cloned().unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct BuildQueueItem {
    pub building: String,
    pub level: i32,
}

pub async fn add_build_step(
    State(state): State<ApiState>,
    Path(vid): Path<u64>,
    Json(item): Json<BuildQueueItem>,
) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, "bq_add", &format!("{vid}:{}:{}", item.building, item.level)).await?;
    let steps = state.dispatch.panel.build_queue(vid).await;
    Ok(Json(json!({ "village_id": vid, "steps": steps })))
}

pub async fn remove_build_step(
    State(state): State<ApiState>,
    Path((vid, index)): Path<(u64, usize)>,
) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, "bq_remove", &format!("{vid}:{index}")).await?;
    let steps = state.dispatch.panel.build_queue(vid).await;
    Ok(Json(json!({ "village_id": vid, "steps": steps })))
}

pub async fn get_config(State(state): State<ApiState>) -> Json<Value> {
    let config = state.dispatch.config.read().await;
    Json(serde_json::to_value(&*config).unwrap_or_default())
}

/// Persists the posted config to `config_path` in addition to updating
/// the in-memory copy the Orchestrator reads every cycle.
pub async fn update_config(
    State(state): State<ApiState>,
    Json(new_config): Json<AppConfig>,
) -> Result<Json<Value>, ApiError> {
    {
        let mut config = state.dispatch.config.write().await;
        *config = new_config;
    }
    let config = state.dispatch.config.read().await;
    crate::config::save_config(&config, &state.config_path)
        .map_err(|err| ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: err.to_string() })?;
    Ok(Json(serde_json::to_value(&*config).unwrap_or_default()))
}

pub async fn set_farm_threshold(
    State(state): State<ApiState>,
    Path(value): Path<u32>,
) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, "farm_threshold", &value.to_string()).await?;
    Ok(Json(json!({ "lc_threshold": state.dispatch.panel.farm_lc_threshold().await })))
}

pub async fn resolve_bot_protection(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, "bot_protection_resolved", "").await?;
    Ok(Json(json!({ "status": "ok", "bot_state": state.dispatch.panel.bot_state().await })))
}

pub async fn set_fill_unit(
    State(state): State<ApiState>,
    Path(unit): Path<String>,
) -> Result<Json<Value>, ApiError> {
    apply_or_reject(&state, "fill_unit", &unit).await?;
    Ok(Json(json!({ "unit": state.dispatch.panel.fill_unit().await })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_profile_and_state() {
        let state = ApiState::new_for_test();
        let Json(body) = health(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["profile"], "test");
    }

    #[tokio::test]
    async fn control_start_transitions_bot_state() {
        let state = ApiState::new_for_test();
        let result = control(State(state.clone()), Path("start".to_string())).await;
        assert!(result.is_ok());
        assert_eq!(state.dispatch.panel.bot_state().await, "running");
    }

    #[tokio::test]
    async fn control_rejects_unknown_action() {
        let state = ApiState::new_for_test();
        let result = control(State(state), Path("spin".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn add_build_step_validates_level_range() {
        let state = ApiState::new_for_test();
        let result =
            add_build_step(State(state), Path(1), Json(BuildQueueItem { building: "wood".into(), level: 99 })).await;
        assert!(result.is_err());
    }
}
