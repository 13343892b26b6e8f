//! Error types for the light transports
use thiserror::Error;

/// Light control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// I/O error (socket bind, send, file access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Target address could not be resolved
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation requires an active session
    #[error("No active session")]
    SessionInactive,

    /// Malformed wire packet
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ControlError::InvalidAddress("nowhere:99".to_string());
        assert_eq!(err.to_string(), "Invalid address: nowhere:99");

        let err: ControlError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
