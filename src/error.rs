//! Error handling for netpath
//!
//! Probe-level failures never surface here: the probe primitive folds them into
//! [`crate::network::ProbeStatus`]. These errors cover input validation,
//! configuration, and collaborator failures that callers have to decide about.

use thiserror::Error;

/// Main error type for diagnostics operations
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Permission denied: {0}")]
    PermissionError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Geo lookup failed: {0}")]
    GeoLookupError(String),

    #[error("Map renderer error: {0}")]
    RendererError(String),
}

impl DiagError {
    /// True for errors caused by bad caller input, raised before any probe runs
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DiagError::InvalidTarget(_) | DiagError::InvalidRange(_) | DiagError::ConfigError(_)
        )
    }

    /// Classify an I/O error raised while opening or using a probe socket
    pub fn from_socket_error(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            DiagError::PermissionError(format!("ICMP socket requires elevated privileges ({})", err))
        } else {
            DiagError::NetworkError(err.to_string())
        }
    }
}

impl From<reqwest::Error> for DiagError {
    fn from(err: reqwest::Error) -> Self {
        DiagError::GeoLookupError(err.to_string())
    }
}

impl From<serde_json::Error> for DiagError {
    fn from(err: serde_json::Error) -> Self {
        DiagError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_error_classification() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(DiagError::from_socket_error(denied), DiagError::PermissionError(_)));

        let other = std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "gone");
        assert!(matches!(DiagError::from_socket_error(other), DiagError::NetworkError(_)));
    }

    #[test]
    fn test_validation_errors() {
        assert!(DiagError::InvalidRange("x".into()).is_validation());
        assert!(DiagError::InvalidTarget("x".into()).is_validation());
        assert!(!DiagError::GeoLookupError("x".into()).is_validation());
    }
}
