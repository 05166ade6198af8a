//! Domain error taxonomy.
//!
//! Expected, named failure modes use [`BotError`]; everything else (IO,
//! (de)serialization, config loading) propagates as `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("session expired")]
    SessionExpired,

    #[error("captcha required")]
    CaptchaRequired,

    #[error("bot protection detected: {0}")]
    ProtectionDetected(String),

    #[error("build queue full")]
    QueueFull,

    #[error("insufficient resources")]
    InsufficientResources,

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("transient transport error: {0}")]
    TransportTransient(String),
}

pub type BotResult<T> = Result<T, BotError>;
