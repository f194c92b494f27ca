//! Caller-facing error taxonomy.
//!
//! Unknown email and wrong password surface as the same
//! `InvalidCredentials` signal on purpose, so a caller cannot probe which
//! addresses hold accounts. Recovery-token failures collapse into
//! `InvalidToken` for the same reason.

use thiserror::Error;
use warden_auth::AuthError;
use warden_store::StoreError;

/// Broad classification of an [`IdentityError`], for callers that map
/// errors onto a transport-level response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The email is already registered.
    Conflict,
    /// Bad credentials or a bad/expired token.
    AuthInvalid,
    /// Account temporarily locked.
    AuthLocked,
    /// Valid credentials but unverified email.
    AuthUnverified,
    /// Structurally valid refresh token that is no longer recognized.
    AuthRevoked,
    /// A referenced resource does not exist for this caller.
    NotFound,
    /// The backing store failed.
    Persistence,
    /// An unexpected internal failure.
    Internal,
}

/// Errors surfaced by the session and recovery managers.
///
/// All variants are recoverable, typed results; none end the process.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The email is already registered.
    #[error("Email already in use")]
    EmailInUse,

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account is temporarily locked following repeated failures.
    #[error("Account temporarily locked. Try again in {minutes} minute(s).")]
    AccountLocked {
        /// Whole minutes until the lock expires, rounded up.
        minutes: i64,
    },

    /// Credentials are valid but the email address is not verified yet.
    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    /// A presented token failed verification or has expired, or a
    /// recovery token does not match any live record.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// A refresh token that verified correctly but has no stored record:
    /// it was rotated, revoked or swept.
    #[error("Refresh token revoked")]
    TokenRevoked,

    /// The session id does not exist or belongs to another account.
    #[error("Session not found")]
    SessionNotFound,

    /// The account id does not exist.
    #[error("Account not found")]
    AccountNotFound,

    /// The backing store failed; state is unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An internal failure, e.g. the hasher rejecting its own parameters.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::EmailInUse => ErrorKind::Conflict,
            IdentityError::InvalidCredentials | IdentityError::InvalidToken => {
                ErrorKind::AuthInvalid
            }
            IdentityError::AccountLocked { .. } => ErrorKind::AuthLocked,
            IdentityError::EmailNotVerified => ErrorKind::AuthUnverified,
            IdentityError::TokenRevoked => ErrorKind::AuthRevoked,
            IdentityError::SessionNotFound | IdentityError::AccountNotFound => ErrorKind::NotFound,
            IdentityError::Store(_) => ErrorKind::Persistence,
            IdentityError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error carries the generic bad-credentials signal.
    #[must_use]
    pub fn is_auth_invalid(&self) -> bool {
        self.kind() == ErrorKind::AuthInvalid
    }
}

impl From<AuthError> for IdentityError {
    fn from(err: AuthError) -> Self {
        if err.is_token_error() {
            IdentityError::InvalidToken
        } else {
            IdentityError::Internal(err.to_string())
        }
    }
}
