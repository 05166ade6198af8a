//! Per-village automation cycle composition.

pub mod pipeline;

pub use pipeline::{CycleResult, VillagePipeline};
