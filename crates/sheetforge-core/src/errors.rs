use std::borrow::Cow;
use std::io;
use thiserror::Error;

/// Failures surfaced by the sync pipeline.
///
/// Schema problems are handled per worksheet (logged and skipped) before
/// they ever become a `TapError`; anything that reaches the orchestrator
/// as an error aborts the sync.
#[derive(Debug, Error)]
pub enum TapError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("timeout during {action}")]
    Timeout { action: Cow<'static, str> },

    #[error("connection error: {details}")]
    Connect { details: Cow<'static, str> },

    #[error("authentication error: {details}")]
    Auth { details: Cow<'static, str> },

    #[error("resource not found: {details}")]
    NotFound { details: Cow<'static, str> },

    #[error("API error (HTTP {status}): {details}")]
    Api {
        status: u16,
        details: Cow<'static, str>,
    },

    #[error("schema issues: {details}")]
    Schema { details: Cow<'static, str> },

    #[error("checkpoint error: {details}")]
    Checkpoint { details: Cow<'static, str> },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
