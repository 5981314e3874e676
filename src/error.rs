//! Error types for the confirmation run
//!
//! Ledger outcomes (duplicate, stale, not found) are never errors: they are
//! reported as `bool`/`Option` or as a [`Rejection`]. `ScheduleError` covers
//! the collaborators and the local filesystem.
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, rate limits
//! - NonRetryable: configuration errors, malformed API responses
//! - RequiresUserAction: missing or revoked tokens

use std::path::PathBuf;
use thiserror::Error;

/// Why the ledger refused an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("appointment is missing required fields or has a malformed date/time")]
    Invalid,

    #[error("appointment date is already in the past")]
    Stale,

    #[error("appointment is already in the ledger")]
    Duplicate,
}

/// Error types for collaborators, config and persistence
#[derive(Debug, Error)]
pub enum ScheduleError {
    // Retryable errors
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("API rate limit exceeded")]
    ApiRateLimit,

    // Non-retryable errors
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("{service} API error {status}: {message}")]
    ApiError {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Unexpected {service} response: {message}")]
    UnexpectedResponse {
        service: &'static str,
        message: String,
    },

    #[error("Mail folder not found: {0}")]
    MailFolderNotFound(PathBuf),

    #[error("Failed to parse message: {0}")]
    MessageParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Requires user action
    #[error("{0} access token missing from config")]
    MissingToken(&'static str),

    #[error("{0} rejected the access token")]
    AuthExpired(&'static str),
}

impl ScheduleError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScheduleError::NetworkError(_) | ScheduleError::Timeout | ScheduleError::ApiRateLimit
        )
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ScheduleError::MissingToken(_) | ScheduleError::AuthExpired(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScheduleError::NetworkError(_) => "Check your internet connection and try again.",
            ScheduleError::Timeout => "The request took too long. Try again.",
            ScheduleError::ApiRateLimit => "Wait a few minutes and try again.",
            ScheduleError::ConfigurationError(_) => {
                "Check your configuration in ~/.tutor-confirm/config.json"
            }
            ScheduleError::ApiError { .. } | ScheduleError::UnexpectedResponse { .. } => {
                "The remote service refused the request. Check the log for details."
            }
            ScheduleError::MailFolderNotFound(_) => {
                "Create the mail folder or fix mailDir/label in the config."
            }
            ScheduleError::MessageParse(_) => "The message is not valid RFC 5322 mail.",
            ScheduleError::Json(_) => "Check the file format is correct.",
            ScheduleError::Io(_) => "Check file permissions and disk space.",
            ScheduleError::MissingToken(_) => "Add the access token to the config file.",
            ScheduleError::AuthExpired(_) => "Generate a fresh access token and update the config.",
        }
    }
}

impl From<reqwest::Error> for ScheduleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScheduleError::Timeout
        } else {
            ScheduleError::NetworkError(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to the matching error variant.
pub(crate) fn status_error(service: &'static str, status: u16, body: String) -> ScheduleError {
    match status {
        401 => ScheduleError::AuthExpired(service),
        429 => ScheduleError::ApiRateLimit,
        _ => ScheduleError::ApiError {
            service,
            status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        assert!(ScheduleError::NetworkError("reset".into()).is_retryable());
        assert!(ScheduleError::Timeout.is_retryable());
        assert!(!ScheduleError::MissingToken("Zoom").is_retryable());
    }

    #[test]
    fn test_token_errors_need_the_user() {
        assert!(ScheduleError::AuthExpired("Gmail").requires_user_action());
        assert!(!ScheduleError::ApiRateLimit.requires_user_action());
    }

    #[test]
    fn test_status_error_maps_auth_and_rate_limit() {
        assert!(matches!(
            status_error("Zoom", 401, String::new()),
            ScheduleError::AuthExpired("Zoom")
        ));
        assert!(matches!(
            status_error("Zoom", 429, String::new()),
            ScheduleError::ApiRateLimit
        ));
        assert!(matches!(
            status_error("Zoom", 500, "boom".into()),
            ScheduleError::ApiError { status: 500, .. }
        ));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::Duplicate.to_string(),
            "appointment is already in the ledger"
        );
    }
}
