//! Auto-recruitment.

pub mod recruiter;

pub use recruiter::{barracks_needs, fill_scavenge_batch, stable_needs, TroopRecruiter};
