//! Recovery-token record model.
//!
//! Email-verification and password-reset tokens share one record shape and
//! are distinguished by kind. An account holds at most one active token of
//! each kind; issuing a new one replaces any prior token of that kind.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt::{Display, Formatter};
use warden_core::AccountId;

/// The two recovery-token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryTokenKind {
    /// Email-verification token (24 hour validity).
    Verification,
    /// Password-reset token (1 hour validity).
    Reset,
}

impl RecoveryTokenKind {
    /// The stable string form used for storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryTokenKind::Verification => "verification",
            RecoveryTokenKind::Reset => "reset",
        }
    }
}

impl Display for RecoveryTokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored recovery-token record.
///
/// Only the SHA-256 digest of the raw token is stored; the raw value goes
/// out once through the mailer and is never seen again.
#[derive(Debug, Clone, FromRow)]
pub struct RecoveryToken {
    /// Unique identifier for this record.
    pub id: uuid::Uuid,

    /// The owning account.
    pub account_id: uuid::Uuid,

    /// SHA-256 hex digest of the raw token.
    pub token_digest: String,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

impl RecoveryToken {
    /// Get the owning account as a typed `AccountId`.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        AccountId::from_uuid(self.account_id)
    }

    /// Check whether the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Input for issuing a recovery token.
#[derive(Debug, Clone)]
pub struct CreateRecoveryToken {
    /// The owning account.
    pub account_id: AccountId,
    /// SHA-256 hex digest of the raw token.
    pub token_digest: String,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn kind_string_forms() {
        assert_eq!(RecoveryTokenKind::Verification.as_str(), "verification");
        assert_eq!(RecoveryTokenKind::Reset.to_string(), "reset");
    }

    #[test]
    fn expiry_check() {
        let token = RecoveryToken {
            id: uuid::Uuid::new_v4(),
            account_id: uuid::Uuid::new_v4(),
            token_digest: "digest".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(!token.is_expired());

        let stale = RecoveryToken {
            expires_at: Utc::now() - Duration::minutes(1),
            ..token
        };
        assert!(stale.is_expired());
    }
}
