//! Authentication error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown for any fault that is not part of the auth error surface.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Boxed source of an unexpected error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during session store operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Signup with an email that is already in the directory.
    #[error("User already exists")]
    UserExists,

    /// Signin with an email that is not in the directory.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Profile update without an authenticated session.
    #[error("No user logged in")]
    NoUserLoggedIn,

    /// Any internal fault (storage, serialization, poisoned lock).
    ///
    /// The display message is generic; the cause is only reachable through
    /// [`std::error::Error::source`].
    #[error("An unexpected error occurred")]
    Unexpected(#[source] BoxError),
}

impl AuthError {
    /// Wraps an internal fault.
    pub fn unexpected(source: impl Into<BoxError>) -> Self {
        Self::Unexpected(source.into())
    }

    /// Returns a stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserExists => "user_exists",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NoUserLoggedIn => "no_user_logged_in",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// Returns the consumer-facing error shape.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string())
    }
}

impl From<crate::StorageError> for AuthError {
    fn from(e: crate::StorageError) -> Self {
        Self::unexpected(e)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        Self::unexpected(e)
    }
}

/// Error payload handed to the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The body used for faults outside the auth error surface.
    pub fn unexpected() -> Self {
        Self::new(UNEXPECTED_ERROR_MESSAGE)
    }
}

impl From<AuthError> for ErrorBody {
    fn from(e: AuthError) -> Self {
        e.to_body()
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
