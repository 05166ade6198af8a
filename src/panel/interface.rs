//! Typed events pushed out of `PanelStateStore` toward connected clients.
//!
//! Headed-mode DOM injection is an opaque, driver-side concern out of
//! scope for this crate; the one concrete projection target here is the
//! WebSocket broadcast used in headless/API mode.

use serde::Serialize;
use tokio::sync::broadcast;

use super::projection::{PanelState, TimerState, VillageStatus};

const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PanelEvent {
    FullState(PanelStateSnapshot),
    Log { message: String, level: String },
    Timer { id: String, state: TimerState },
    TimerCleared { id: String },
    VillageStatus(VillageStatus),
    Toggles(std::collections::HashMap<String, bool>),
    TroopsMode { mode: String, fill_units: Vec<String> },
    BotProtection { detected: bool, pattern: String },
    FillUnit { unit: String },
    BotState { state: String },
}

/// Boxed clone of a full snapshot, wrapped so `PanelEvent` stays cheap to
/// clone for the common incremental-event case.
#[derive(Debug, Clone, Serialize)]
pub struct PanelStateSnapshot(pub std::sync::Arc<PanelState>);

/// Broadcast sender shared by every WS connection handler; subscribing
/// late (after events already fired) is fine because a fresh connection
/// always receives `FullState` first via `PanelProjection::hello`.
#[derive(Clone)]
pub struct PanelProjection {
    tx: broadcast::Sender<PanelEvent>,
}

impl PanelProjection {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.tx.subscribe()
    }

    /// Build the initial event a freshly connected client should see.
    pub fn hello(&self, state: PanelState) -> PanelEvent {
        PanelEvent::FullState(PanelStateSnapshot(std::sync::Arc::new(state)))
    }

    pub fn emit(&self, event: PanelEvent) {
        // No receivers yet (e.g. no WS clients connected) is not an error.
        let _ = self.tx.send(event);
    }
}

impl Default for PanelProjection {
    fn default() -> Self {
        Self::new()
    }
}
