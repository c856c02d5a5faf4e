use std::fmt;

use thiserror::Error;

pub use shared::error::DecodeError;

/// Network or HTTP status failure. `status` is absent when no response
/// was received at all (connection refused, timeout, aborted body).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TransportError {
    pub status: Option<u16>,
    pub cause: String,
}

impl TransportError {
    pub fn network(cause: impl Into<String>) -> Self {
        Self {
            status: None,
            cause: cause.into(),
        }
    }

    pub fn status(status: u16, cause: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            cause: cause.into(),
        }
    }

    pub fn timed_out() -> Self {
        Self::network("request timed out")
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.cause),
            None => write!(f, "{}", self.cause),
        }
    }
}

/// Everything an endpoint binding can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationFailure {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl OperationFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status,
            Self::Decode(_) => None,
        }
    }
}
