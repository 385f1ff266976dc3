//! Error types for the filing engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while filing a report.
#[derive(Error, Debug)]
pub enum FilingError {
    /// No credential entry exists for the report's owner
    #[error("no portal credentials stored for owner {owner_id}")]
    CredentialsMissing {
        /// Owner the lookup was made for
        owner_id: String,
    },

    /// Stored data could not be interpreted (e.g. a malformed secret)
    #[error("{0}")]
    InternalError(String),

    /// Browser could not be launched or driven to the expected page
    #[error("{0}")]
    SessionError(String),

    /// The portal rejected the login or it timed out
    #[error("{0}")]
    AuthenticationFailed(String),

    /// A mapped form control could not be classified or filled
    #[error("field '{field}' ({selector}): {reason}")]
    FillError {
        /// Report field key being filled
        field: String,
        /// Locator of the control
        selector: String,
        /// What went wrong
        reason: String,
    },

    /// Clicking the form's submit control failed
    #[error("{0}")]
    SubmitError(String),

    /// Storage failure
    #[error("database error: {0}")]
    Database(#[from] supervisao_db::DatabaseError),

    /// Invalid portal configuration
    #[error("configuration error: {0}")]
    Config(#[from] supervisao_core::ConfigError),

    /// Queue subscription failure
    #[error("queue error: {0}")]
    Queue(String),
}

impl FilingError {
    /// Classify the error for the report's failure message.
    ///
    /// Infrastructure errors surface as `InternalError`.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::CredentialsMissing { .. } => FailureReason::CredentialsMissing,
            Self::SessionError(_) => FailureReason::SessionError,
            Self::AuthenticationFailed(_) => FailureReason::AuthenticationFailed,
            Self::FillError { .. } => FailureReason::FillError,
            Self::SubmitError(_) => FailureReason::SubmitError,
            Self::InternalError(_) | Self::Database(_) | Self::Config(_) | Self::Queue(_) => {
                FailureReason::InternalError
            }
        }
    }

    /// Human-readable message stored on a failed report, prefixed with its reason.
    #[must_use]
    pub fn failure_message(&self) -> String {
        format!("{}: {self}", self.reason())
    }
}

/// Closed set of reasons a report can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Owner has no stored credentials
    CredentialsMissing,
    /// Malformed stored data or storage failure
    InternalError,
    /// Browser launch or navigation failed
    SessionError,
    /// Login rejected or timed out
    AuthenticationFailed,
    /// A field could not be filled
    FillError,
    /// The submit click failed
    SubmitError,
}

impl FailureReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialsMissing => "CREDENTIALS_MISSING",
            Self::InternalError => "INTERNAL_ERROR",
            Self::SessionError => "SESSION_ERROR",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::FillError => "FILL_ERROR",
            Self::SubmitError => "SUBMIT_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result type for filing operations.
pub type Result<T> = std::result::Result<T, FilingError>;
