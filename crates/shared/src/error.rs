use thiserror::Error;

/// A device response that could not be turned into the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {endpoint} response: {cause}")]
pub struct DecodeError {
    pub endpoint: &'static str,
    pub cause: String,
}

impl DecodeError {
    pub fn new(endpoint: &'static str, cause: impl Into<String>) -> Self {
        Self {
            endpoint,
            cause: cause.into(),
        }
    }
}
