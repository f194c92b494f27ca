//! Token claims.
//!
//! Both access and refresh tokens carry the same claim shape: the owning
//! account as `sub`, the account email, and the standard timing claims.
//! The `jti` makes every issued token unique even within one second, which
//! keeps stored refresh-token digests collision-free.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::AccountId;

/// Claims carried by warden-issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the account id as a UUID string.
    pub sub: String,

    /// The account's email address at issuance time.
    pub email: String,

    /// Expiration time as a Unix timestamp.
    pub exp: i64,

    /// Issued-at as a Unix timestamp.
    pub iat: i64,

    /// Unique token identifier.
    pub jti: String,
}

impl Claims {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> ClaimsBuilder {
        ClaimsBuilder::default()
    }

    /// Check whether the expiration instant has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    /// Parse the subject into a typed account id.
    ///
    /// Returns `None` if `sub` is not a valid UUID.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        self.sub.parse().ok()
    }
}

/// Builder for [`Claims`].
#[derive(Debug, Default)]
pub struct ClaimsBuilder {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    jti: Option<String>,
}

impl ClaimsBuilder {
    /// Set the subject from a typed account id.
    #[must_use]
    pub fn subject(mut self, id: AccountId) -> Self {
        self.sub = Some(id.to_string());
        self
    }

    /// Set the account email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the expiration as a Unix timestamp.
    #[must_use]
    pub fn expiration(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Set the expiration as seconds from now.
    #[must_use]
    pub fn expires_in_secs(mut self, secs: i64) -> Self {
        self.exp = Some(Utc::now().timestamp() + secs);
        self
    }

    /// Set the expiration as a duration from now.
    #[must_use]
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.exp = Some((Utc::now() + duration).timestamp());
        self
    }

    /// Set the issued-at timestamp.
    #[must_use]
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.iat = Some(iat);
        self
    }

    /// Set the token identifier.
    #[must_use]
    pub fn token_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Build the claims.
    ///
    /// Defaults: `exp` one hour from now, `iat` now, `jti` a fresh UUID v4.
    #[must_use]
    pub fn build(self) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: self.sub.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            exp: self.exp.unwrap_or(now + 3600),
            iat: self.iat.unwrap_or(now),
            jti: self.jti.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let claims = Claims::builder()
            .subject(AccountId::new())
            .email("a@example.com")
            .build();

        assert_eq!(claims.email, "a@example.com");
        assert!(!claims.jti.is_empty());
        assert!(!claims.is_expired());
    }

    #[test]
    fn subject_round_trips_to_account_id() {
        let id = AccountId::new();
        let claims = Claims::builder().subject(id).build();
        assert_eq!(claims.account_id(), Some(id));
    }

    #[test]
    fn malformed_subject_yields_none() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            email: String::new(),
            exp: 0,
            iat: 0,
            jti: String::new(),
        };
        assert!(claims.account_id().is_none());
    }

    #[test]
    fn expiration_in_past_is_expired() {
        let claims = Claims::builder()
            .subject(AccountId::new())
            .expiration(Utc::now().timestamp() - 60)
            .build();
        assert!(claims.is_expired());
    }

    #[test]
    fn jti_differs_per_build() {
        let id = AccountId::new();
        let a = Claims::builder().subject(id).build();
        let b = Claims::builder().subject(id).build();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn serializes_all_fields() {
        let claims = Claims::builder()
            .subject(AccountId::new())
            .email("a@example.com")
            .build();
        let json = serde_json::to_string(&claims).unwrap();
        for field in ["sub", "email", "exp", "iat", "jti"] {
            assert!(json.contains(field), "missing {field}");
        }
    }
}
