//! Error types for rollbar-relay

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors raised while setting the relay up.
///
/// None of these ever reach the host's request/response cycle. Once the relay
/// is registered, every failure on the reporting path is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Environment variable deserialization failed.
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    /// A level string did not name a known severity.
    #[error("Invalid level: {0}")]
    InvalidLevel(String),
}
