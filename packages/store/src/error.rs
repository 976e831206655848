//! Error types shared by the repositories, the table stores and the identity seam.

use thiserror::Error;

/// Failure of a repository or [`crate::TableStore`] operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A required field is missing or empty. Raised before any remote call.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The remote store reported zero rows for this id and owner.
    #[error("no {table} row with id {id}")]
    NotFound { table: &'static str, id: String },

    /// Transport or server failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Owner mismatch, closed session, or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote returned a row that does not decode into the expected entity.
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

impl StoreError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether repeating the same read may succeed.
    ///
    /// Only reads should be retried; a failed create must not be repeated blindly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Failure of an [`crate::IdentityProvider`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    AlreadyRegistered,

    #[error("{0}")]
    Validation(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("not signed in")]
    NotSignedIn,
}
