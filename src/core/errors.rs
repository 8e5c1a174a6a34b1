use std::time::Duration;
use thiserror::Error;

/// Every failure the pipeline can hand back to a caller.
///
/// Nothing below the pipeline boundary (reqwest, serde, io) leaks past this
/// type: transport code maps its errors into one of these variants before
/// returning.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Session expired: {message}")]
    SessionExpired { message: String },

    #[error("Business error: {code:?} - {message}")]
    Business { code: Option<i64>, message: String },

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Device id error: {0}")]
    DeviceId(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::core::config::ConfigError),
}

impl PipelineError {
    /// True for the marker delivered when a stream owner cancels the call.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// True when no response reached the client at all.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Server-side error code, when the server reported one.
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Business { code, .. } => *code,
            Self::Http { status, .. } => Some(*status as i64),
            _ => None,
        }
    }
}
