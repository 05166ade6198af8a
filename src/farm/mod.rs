//! Farm-assistant automation.

pub mod runner;

pub use runner::{choose_template, FarmRunner, FarmTemplateChoice};
