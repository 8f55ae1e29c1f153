//! Typed error hierarchy for the discovery orchestrator.
//!
//! Two top-level enums cover the two error surfaces:
//! - `StageError` — errors a single stage can fail with
//! - `EngineError` — errors that abort a whole session (merge invariant
//!   violations, scheduler faults, cancellation)
//!
//! `StageError` recovers locally (the engine logs it and continues with
//! empty defaults); `EngineError` surfaces as a terminal `error` event.

use thiserror::Error;

/// Errors a single stage can fail with. The engine's policy is to log,
/// emit an error progress record, and carry on with empty defaults for
/// that stage's outputs — no variant here aborts a session by itself.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("transient external failure in {adapter}: {message}")]
    TransientExternal { adapter: String, message: String },

    #[error("invalid input for stage {stage}: {message}")]
    InvalidInput { stage: String, message: String },

    #[error("internal error in stage {stage}: {message}")]
    Internal { stage: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn transient(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientExternal {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn invalid(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn internal(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Errors that abort a whole session. Surfaced to the client as a single
/// terminal `error` event; the stream is then closed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("merge invariant violated: {0}")]
    MergeInvariantViolated(String),

    #[error("session {0} already has an orchestration in flight")]
    SessionAlreadyRunning(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// The reason string carried on the terminal SSE `error` event.
    pub fn client_reason(&self) -> String {
        match self {
            EngineError::Cancelled => "cancelled".to_string(),
            other => other.to_string(),
        }
    }
}

/// Errors surfaced at the HTTP boundary (request validation, routing).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
