//! Error types surfaced by the core crate.

use std::path::PathBuf;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure returned by a REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential. The store has already been cleared.
    #[error("{0}")]
    Unauthorized(String),
    /// Any other non-success status.
    #[error("{message}")]
    Http {
        /// Response status code.
        status: StatusCode,
        /// Message from the error envelope, or the operation's fallback.
        message: String,
    },
    /// The request never produced a response.
    #[error("{context}: {source}")]
    Network {
        /// Fallback message of the failed operation.
        context: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body did not match the expected shape.
    #[error("{context}: invalid response ({source})")]
    Decode {
        /// Fallback message of the failed operation.
        context: String,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The request could not be built (bad base URL, invalid header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(message) => message.clone(),
            ApiError::Http { message, .. } => message.clone(),
            ApiError::Network { context, .. } | ApiError::Decode { context, .. } => context.clone(),
            ApiError::InvalidRequest(message) => message.clone(),
        }
    }

    /// Returns `true` for a 401 response.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Generic failure body returned by the API.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable message, when the server provides one.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Extract the envelope message from a raw body, falling back when absent or blank.
    pub fn message_or(body: &str, fallback: &str) -> String {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.message)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Failure reading or writing the persisted credential.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error on the credential file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Credential file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Serialisation error while writing the credential file.
    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure loading application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered sources could not be merged or deserialised.
    #[error("invalid configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// The default config file could not be written.
    #[error("failed to write default config {path}: {source}")]
    Write {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A value was parsed but is out of range.
    #[error("invalid configuration: {key} {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// No platform config directory could be determined.
    #[error("could not determine a configuration directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_message_wins_over_fallback() {
        let message = ErrorEnvelope::message_or(r#"{"message":"Trip is full"}"#, "Failed");
        assert_eq!(message, "Trip is full");
    }

    #[test]
    fn fallback_used_for_missing_or_blank_message() {
        assert_eq!(ErrorEnvelope::message_or("{}", "Failed"), "Failed");
        assert_eq!(
            ErrorEnvelope::message_or(r#"{"message":"  "}"#, "Failed"),
            "Failed"
        );
        assert_eq!(ErrorEnvelope::message_or("<html>", "Failed"), "Failed");
    }

    #[test]
    fn unauthorized_reports_401() {
        let err = ApiError::Unauthorized("Session expired".to_string());
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.user_message(), "Session expired");
    }
}
