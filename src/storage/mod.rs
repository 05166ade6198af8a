//! On-disk state: the single-instance process lock and the small JSON
//! files that survive a restart (build queues, toggle overrides).

pub mod lockfile;
pub mod persistence;

pub use lockfile::ProcessLock;
pub use persistence::{
    load_build_queues, load_toggle_states, save_build_queues, save_toggle_states, BuildQueueStep,
};
