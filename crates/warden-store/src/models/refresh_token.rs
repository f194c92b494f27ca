//! Refresh-token record model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use warden_core::{AccountId, SessionId};

/// A stored refresh-token record.
///
/// Only the SHA-256 digest of the raw token is stored. A record is deleted
/// exactly once: by rotation, explicit revocation, logout, or the expiry
/// sweep. The record id doubles as the session id surfaced to callers.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    /// Unique identifier for this record (and session).
    pub id: uuid::Uuid,

    /// The owning account.
    pub account_id: uuid::Uuid,

    /// SHA-256 hex digest of the raw refresh token.
    pub token_digest: String,

    /// Expiry, taken from the refresh token's own exp claim.
    pub expires_at: DateTime<Utc>,

    /// When the record was created. Drives FIFO session eviction.
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Get the record id as a typed `SessionId`.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::from_uuid(self.id)
    }

    /// Get the owning account as a typed `AccountId`.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        AccountId::from_uuid(self.account_id)
    }

    /// Check whether the record has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Input for creating a refresh-token record.
#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    /// The owning account.
    pub account_id: AccountId,
    /// SHA-256 hex digest of the raw refresh token.
    pub token_digest: String,
    /// Expiry of the raw token.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: uuid::Uuid::new_v4(),
            account_id: uuid::Uuid::new_v4(),
            token_digest: "digest".to_string(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn live_record_is_not_expired() {
        assert!(!record(Utc::now() + Duration::days(7)).is_expired());
    }

    #[test]
    fn past_expiry_is_expired() {
        assert!(record(Utc::now() - Duration::seconds(1)).is_expired());
    }

    #[test]
    fn typed_ids_match_row_ids() {
        let rec = record(Utc::now() + Duration::days(1));
        assert_eq!(*rec.session_id().as_uuid(), rec.id);
        assert_eq!(*rec.account_id().as_uuid(), rec.account_id);
    }
}
