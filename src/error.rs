// src/error.rs
// Error taxonomy for the tool-call proxy

use std::time::Duration;

use thiserror::Error;

/// Main error type for the proxy core
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The executor has not finished warming up
    #[error("tool executor not ready")]
    NotReady,

    /// Another tool call is already waiting on the executor
    #[error("tool executor busy with another request")]
    Busy,

    /// No envelope arrived inside the correlation window
    #[error("tool executor did not respond within {after:?}")]
    Timeout { after: Duration },

    /// The executor process exited or its streams broke
    #[error("tool executor crashed: {0}")]
    ExecutorCrash(String),

    #[error("failed to spawn tool executor `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}

/// Convenience type alias for Result using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProxyError::NotReady | ProxyError::Busy | ProxyError::Timeout { .. }
        )
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::NotReady => "NOT_READY",
            ProxyError::Busy => "BUSY",
            ProxyError::Timeout { .. } => "TIMEOUT",
            ProxyError::ExecutorCrash(_) => "EXECUTOR_CRASH",
            ProxyError::Spawn { .. } => "SPAWN_FAILED",
            ProxyError::InvalidInput(_) => "BAD_REQUEST",
            ProxyError::Io(_) | ProxyError::Json(_) => "INTERNAL_ERROR",
            ProxyError::Cancelled => "CANCELLED",
        }
    }
}
