//! Panel state projection: the authoritative bot-state record and its
//! WebSocket broadcast.

pub mod interface;
pub mod projection;

pub use interface::{PanelEvent, PanelProjection};
pub use projection::{LogEntry, PanelState, PanelStateStore, TimerState, VillageConfig, VillageStatus};
