//! HTTP/WS control surface for headless mode.
//!
//! Handlers call into [`crate::orchestrator::ActionDispatcher`] directly
//! and synchronously, then read back authoritative state for the response
//! — the same call-then-read-back model the bot's panel callbacks use
//! in-process, rather than a fire-and-forget queue.

pub mod handlers;
mod routes;
mod ws;

pub use handlers::ApiState;

use axum::Router;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

/// Build the full router: the REST surface under `/api`, plus the `/ws`
/// upgrade endpoint.
pub fn create_app(state: ApiState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .route("/ws", axum::routing::get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Uniform error response shape for handlers that reject a request.
#[derive(Debug)]
pub struct ApiError {
    pub status: axum::http::StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: axum::http::StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: axum::http::StatusCode::NOT_FOUND, message: message.into() }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": { "message": self.message } });
        (self.status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    pub fn test_state() -> ApiState {
        ApiState::new_for_test()
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = create_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = create_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/does-not-exist").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
