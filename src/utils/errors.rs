use thiserror::Error;

/// Errors raised while validating a loaded [`crate::Config`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} cannot exceed {max_ms}ms. Received: {got_ms}ms")]
    TimeoutTooLarge {
        field: &'static str,
        max_ms: u64,
        got_ms: u64,
    },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
