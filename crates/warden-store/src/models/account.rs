//! Account entity model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use warden_core::AccountId;

/// An account in the system.
///
/// The failure counter and lock expiry are only ever written together by
/// the lockout transition, and both reset on any successful
/// authentication. `password_hash` is an Argon2id PHC string; the
/// plaintext never reaches storage.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    /// Unique identifier for the account.
    pub id: uuid::Uuid,

    /// Email address (globally unique).
    pub email: String,

    /// Argon2id password hash.
    pub password_hash: String,

    /// Display name.
    pub display_name: String,

    /// Whether the email address has been verified.
    pub email_verified: bool,

    /// Consecutive failed login attempts.
    pub failed_attempts: i32,

    /// When the lockout expires (None if not locked).
    pub locked_until: Option<DateTime<Utc>>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Get the account id as a typed `AccountId`.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        AccountId::from_uuid(self.id)
    }

    /// Check whether the account is locked at the given instant.
    #[must_use]
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Input for creating a new account.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    /// Email address, already normalized by the caller.
    pub email: String,
    /// Argon2id hash of the initial password.
    pub password_hash: String,
    /// Display name.
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(locked_until: Option<DateTime<Utc>>) -> Account {
        Account {
            id: uuid::Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "Ada".to_string(),
            email_verified: false,
            failed_attempts: 0,
            locked_until,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unlocked_when_no_expiry() {
        assert!(!account(None).is_locked_at(Utc::now()));
    }

    #[test]
    fn locked_while_expiry_in_future() {
        let acct = account(Some(Utc::now() + Duration::minutes(10)));
        assert!(acct.is_locked_at(Utc::now()));
    }

    #[test]
    fn unlocked_once_expiry_passes() {
        let acct = account(Some(Utc::now() - Duration::seconds(1)));
        assert!(!acct.is_locked_at(Utc::now()));
    }

    #[test]
    fn typed_id_matches_row_id() {
        let acct = account(None);
        assert_eq!(*acct.account_id().as_uuid(), acct.id);
    }
}
