//! Error types for credential and token operations.

use thiserror::Error;

/// Authentication primitive errors.
///
/// Each variant maps to a specific failure mode in password or token
/// handling. Callers translate these into their own caller-facing error
/// taxonomy; nothing here is fatal.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // Token errors
    /// Token has expired (exp claim is in the past).
    #[error("Token has expired")]
    TokenExpired,

    /// Token signature does not verify against the expected secret.
    ///
    /// Also raised when a token of one class is presented as the other,
    /// since access and refresh tokens are signed with distinct secrets.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is malformed or otherwise invalid.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token uses an unsupported algorithm.
    #[error("Unsupported algorithm")]
    InvalidAlgorithm,

    // Password errors
    /// Password hashing operation failed.
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Stored password hash is not a valid PHC string.
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

impl AuthError {
    /// Check if this error indicates an expired token.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, AuthError::TokenExpired)
    }

    /// Check if this error relates to token validation.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::InvalidSignature
                | AuthError::InvalidToken(_)
                | AuthError::InvalidAlgorithm
        )
    }

    /// Check if this error relates to password operations.
    #[must_use]
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            AuthError::HashingFailed(_) | AuthError::InvalidHashFormat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(AuthError::TokenExpired.to_string(), "Token has expired");
        assert_eq!(
            AuthError::InvalidToken("bad base64".to_string()).to_string(),
            "Invalid token: bad base64"
        );
        assert_eq!(
            AuthError::InvalidHashFormat.to_string(),
            "Invalid password hash format"
        );
    }

    #[test]
    fn classification_predicates() {
        assert!(AuthError::TokenExpired.is_expired());
        assert!(AuthError::TokenExpired.is_token_error());
        assert!(AuthError::InvalidSignature.is_token_error());
        assert!(!AuthError::InvalidSignature.is_password_error());

        assert!(AuthError::HashingFailed("oom".to_string()).is_password_error());
        assert!(!AuthError::HashingFailed("oom".to_string()).is_token_error());
    }
}
