//! `/api` route table. Unversioned: there is exactly one generation of
//! this API, so no `/api/v1` prefix.

use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/control/:action", post(handlers::control))
        .route("/toggles", get(handlers::get_toggles))
        .route("/toggles/:feature", post(handlers::toggle_feature))
        .route("/villages", get(handlers::villages))
        .route("/build-queue/:vid", get(handlers::get_build_queue))
        .route("/build-queue/:vid", post(handlers::add_build_step))
        .route("/build-queue/:vid/:index", delete(handlers::remove_build_step))
        .route("/config", get(handlers::get_config))
        .route("/config", post(handlers::update_config))
        .route("/farm-threshold/:value", post(handlers::set_farm_threshold))
        .route("/bot-protection/resolve", post(handlers::resolve_bot_protection))
        .route("/fill-unit/:unit", post(handlers::set_fill_unit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::ApiState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_route_responds_ok() {
        let app = api_routes(ApiState::new_for_test());
        let response =
            app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn control_route_rejects_bad_action() {
        let app = api_routes(ApiState::new_for_test());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/control/spin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
