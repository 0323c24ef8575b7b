use thiserror::Error;

use super::donations_model::DonationForm;
use crate::errors::{Error, ErrorKind, FieldError, ValidationError};

/// Failures of a donation submission, each carrying what the donation page
/// needs to recover.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DonationError {
    #[error("Please correct the highlighted fields")]
    Invalid(Vec<FieldError>),

    #[error("Sign in to complete your donation")]
    AuthRequired { redirect_to: String },

    /// The form is handed back so the donor can resubmit without retyping.
    #[error("{message}")]
    SubmissionFailed { message: String, form: DonationForm },
}

impl DonationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DonationError::Invalid(_) => ErrorKind::ValidationFailed,
            DonationError::AuthRequired { .. } => ErrorKind::NotAuthenticated,
            DonationError::SubmissionFailed { .. } => ErrorKind::SubmissionFailed,
        }
    }

    /// The retained form, for failed submissions.
    pub fn form(&self) -> Option<&DonationForm> {
        match self {
            DonationError::SubmissionFailed { form, .. } => Some(form),
            _ => None,
        }
    }
}

impl From<DonationError> for Error {
    fn from(err: DonationError) -> Self {
        match err {
            DonationError::Invalid(fields) => Error::Validation(ValidationError::Fields(fields)),
            DonationError::AuthRequired { .. } => Error::NotAuthenticated,
            DonationError::SubmissionFailed { message, .. } => Error::SubmissionFailed(message),
        }
    }
}
