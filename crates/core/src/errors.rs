//! Core error types for the HopeFund client.
//!
//! This module defines backend-agnostic error types. Transport-specific
//! errors (HTTP, WebSocket, JSON) are converted to [`GatewayError`] by the
//! gateway crates, and flows convert gateway errors into the classified
//! kinds below before anything reaches the presentation layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Type alias for Result using the gateway error type.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Root error type for the client core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with email '{0}' already exists")]
    DuplicateIdentity(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("You need to sign in to continue")]
    NotAuthenticated,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Temporary failure, please retry: {0}")]
    TransientFailure(String),

    #[error("Donation could not be submitted: {0}")]
    SubmissionFailed(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Error kinds exposed to the presentation layer.
///
/// Every failure path in the core ends up as one of these, so views can
/// decide between a form message, a redirect, an empty state or a retry
/// affordance without looking at transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidCredentials,
    DuplicateIdentity,
    ValidationFailed,
    NotAuthenticated,
    NotFound,
    TransientFailure,
    SubmissionFailed,
    Unexpected,
}

impl ErrorKind {
    /// Whether the view should offer a retry control for this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientFailure | ErrorKind::SubmissionFailed)
    }
}

impl Error {
    /// Classifies this error for the presentation layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCredentials => ErrorKind::InvalidCredentials,
            Error::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            Error::Validation(_) => ErrorKind::ValidationFailed,
            Error::NotAuthenticated => ErrorKind::NotAuthenticated,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::TransientFailure(_) => ErrorKind::TransientFailure,
            Error::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            Error::Storage(_) | Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validation errors for user input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("{}", format_field_errors(.0))]
    Fields(Vec<FieldError>),
}

impl ValidationError {
    /// Field-level messages carried by this error, if any.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ValidationError::Fields(errors) => errors,
            _ => &[],
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Backend-agnostic error type for Remote Data Gateway calls.
///
/// Gateway implementations map their transport errors into this enum.
/// It never reaches the presentation layer directly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The backend refused the credentials.
    #[error("Credentials rejected: {0}")]
    AuthRejected(String),

    /// A uniqueness constraint was violated (e.g. email already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The requested record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or timed out.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with an error status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response could not be decoded into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Unavailable(_) => true,
            GatewayError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<GatewayError> for Error {
    /// Default classification used by read paths. Write paths (sign-in,
    /// donation submission) classify explicitly instead.
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(what) => Error::NotFound(what),
            GatewayError::AuthRejected(_) => Error::NotAuthenticated,
            GatewayError::Conflict(msg) => Error::Unexpected(msg),
            other => Error::TransientFailure(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
