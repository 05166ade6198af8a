//! `/ws` — full-state hello followed by the broadcast projection, with
//! inbound `{action, value}` messages dispatched through the same
//! [`crate::action_bus`] parser the REST handlers use.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::action_bus;

use super::handlers::ApiState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    action: String,
    #[serde(default)]
    value: String,
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let mut events = state.dispatch.projection.subscribe();

    let hello = state.dispatch.projection.hello(state.dispatch.panel.snapshot().await);
    if send_event(&mut socket, &hello).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ws client lagged behind panel broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_inbound(&state, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "ws recv error");
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_inbound(state: &ApiState, text: &str) {
    let Ok(parsed) = serde_json::from_str::<InboundMessage>(text) else {
        warn!(payload = text, "malformed ws message");
        return;
    };
    match action_bus::parse(&parsed.action, &parsed.value) {
        Some(action) => state.dispatch.apply_action(action).await,
        None => warn!(action = parsed.action, value = parsed.value, "rejected ws action"),
    }
}

async fn send_event(socket: &mut WebSocket, event: &crate::panel::PanelEvent) -> Result<(), axum::Error> {
    let body = serde_json::to_string(event).unwrap_or_default();
    socket.send(Message::Text(body)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_message_parses_action_and_value() {
        let parsed: InboundMessage = serde_json::from_str(r#"{"action":"start","value":""}"#).unwrap();
        assert_eq!(parsed.action, "start");
    }

    #[test]
    fn inbound_message_defaults_missing_value() {
        let parsed: InboundMessage = serde_json::from_str(r#"{"action":"stop"}"#).unwrap();
        assert_eq!(parsed.value, "");
    }
}
