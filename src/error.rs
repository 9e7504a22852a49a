//! Error types for the search evaluator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while configuring or running an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file error or missing required setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The evaluation request itself cannot be run.
    #[error("Invalid evaluation: {0}")]
    InvalidConfig(String),

    /// The remote endpoint answered with a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    Http { status: u16, status_text: String },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// A response body did not have the expected shape.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Scoring API error.
    #[error("Scoring API error: {0}")]
    LlmApi(String),

    /// There is nothing to grade.
    #[error("Cannot score an empty result list")]
    EmptyResults,
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an HTTP error from a response status.
    pub fn http(status: reqwest::StatusCode) -> Self {
        Self::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_carries_status() {
        let err = EvalError::http(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        match &err {
            EvalError::Http {
                status,
                status_text,
            } => {
                assert_eq!(*status, 503);
                assert_eq!(status_text, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "HTTP 503 Service Unavailable");
    }
}
