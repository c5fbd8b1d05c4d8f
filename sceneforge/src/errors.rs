//! Error types for the scene-generation pipeline.
//!
//! Failures fall into two families: errors crossing the collaborator
//! boundary ([`ServiceError`], returned by every remote generation call) and
//! errors raised before a run starts ([`ConfigError`], [`PayloadError`]).
//! Failures *inside* a run are not errors in the `Result` sense — they are
//! reported as `failed` events on the run's stream.

use std::time::Duration;
use thiserror::Error;

/// Error returned by a remote generation collaborator.
///
/// The pipeline never inspects these beyond their message: a per-object
/// call's error becomes an identity-scoped `failed` event, while an
/// analysis or composite error terminates the run.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Transport-level failure before a response was received.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("service returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or status line.
        message: String,
    },

    /// A response arrived but did not contain what the contract promises.
    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// The call exceeded the configured deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled while the call was in flight.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Error building a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    /// A configuration value is out of range or malformed.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        /// The configuration field.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

/// Error decoding an image payload from its wire representation.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The string is not a `data:` URI.
    #[error("not a data URI")]
    NotADataUri,

    /// The base64 section failed to decode.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::Status {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "service returned status 429: quota exceeded");
    }

    #[test]
    fn test_timeout_error_carries_deadline() {
        let err = ServiceError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnv("GEMINI_API_KEY");
        assert_eq!(err.to_string(), "missing environment variable GEMINI_API_KEY");
    }
}
