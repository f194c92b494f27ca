//! Signed-token codec and at-rest digests.
//!
//! Two token classes are issued per successful login: a short-lived access
//! token and a longer-lived refresh token. Both are HS256 JWTs, but each
//! class is signed with its own secret, so a token of one class presented
//! as the other fails signature verification outright.
//!
//! Raw refresh and recovery tokens are handed to the caller exactly once;
//! only their SHA-256 digest is ever stored.

use crate::claims::Claims;
use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use warden_core::AccountId;

/// Default access token validity in minutes.
pub const ACCESS_TOKEN_VALIDITY_MINUTES: i64 = 15;

/// Default refresh token validity in days.
pub const REFRESH_TOKEN_VALIDITY_DAYS: i64 = 7;

/// Password reset token validity in hours.
pub const PASSWORD_RESET_TOKEN_VALIDITY_HOURS: i64 = 1;

/// Email verification token validity in hours.
pub const EMAIL_VERIFICATION_TOKEN_VALIDITY_HOURS: i64 = 24;

/// Size of opaque recovery tokens in bytes (256 bits of entropy).
pub const SECURE_TOKEN_BYTES: usize = 32;

/// Clock-skew tolerance for exp/iat validation, in seconds.
const VALIDATION_LEEWAY_SECS: u64 = 60;

/// Signing configuration for the codec.
///
/// The two secrets must be distinct values; sharing one secret across both
/// classes would let an access token pass refresh verification.
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret used to sign and verify access tokens.
    pub access_secret: Vec<u8>,
    /// Secret used to sign and verify refresh tokens.
    pub refresh_secret: Vec<u8>,
}

/// The result of issuing a token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Signed access token, handed to the caller.
    pub access_token: String,
    /// Signed refresh token, handed to the caller exactly once.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Expiry of the refresh token, taken from its own exp claim. This is
    /// what the stored refresh-token record carries.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Codec for issuing and verifying access/refresh token pairs.
#[derive(Clone)]
pub struct TokenCodec {
    config: TokenConfig,
    access_validity: Duration,
    refresh_validity: Duration,
}

impl TokenCodec {
    /// Create a codec with the default validity periods.
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config,
            access_validity: Duration::minutes(ACCESS_TOKEN_VALIDITY_MINUTES),
            refresh_validity: Duration::days(REFRESH_TOKEN_VALIDITY_DAYS),
        }
    }

    /// Create a codec with custom validity periods.
    #[must_use]
    pub fn with_validity(
        config: TokenConfig,
        access_validity: Duration,
        refresh_validity: Duration,
    ) -> Self {
        Self {
            config,
            access_validity,
            refresh_validity,
        }
    }

    /// Issue a fresh access/refresh pair for an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if encoding fails.
    pub fn issue_pair(&self, account_id: AccountId, email: &str) -> Result<IssuedTokens, AuthError> {
        let access_claims = Claims::builder()
            .subject(account_id)
            .email(email)
            .expires_in(self.access_validity)
            .build();
        let refresh_claims = Claims::builder()
            .subject(account_id)
            .email(email)
            .expires_in(self.refresh_validity)
            .build();

        let access_token = encode_with_secret(&access_claims, &self.config.access_secret)?;
        let refresh_token = encode_with_secret(&refresh_claims, &self.config.refresh_secret)?;

        let refresh_expires_at = Utc
            .timestamp_opt(refresh_claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidToken("Refresh expiry out of range".to_string()))?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in: self.access_validity.num_seconds(),
            refresh_expires_at,
        })
    }

    /// Verify an access token and return its claims.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenExpired` - past its exp claim
    /// - `AuthError::InvalidSignature` - wrong secret, including refresh
    ///   tokens presented as access tokens
    /// - `AuthError::InvalidToken` - malformed input
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        decode_with_secret(token, &self.config.access_secret)
    }

    /// Verify a refresh token and return its claims.
    ///
    /// Same failure modes as [`TokenCodec::verify_access`], against the
    /// refresh secret.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        decode_with_secret(token, &self.config.refresh_secret)
    }

    /// Access token validity in seconds.
    #[must_use]
    pub fn access_validity_secs(&self) -> i64 {
        self.access_validity.num_seconds()
    }
}

fn encode_with_secret(claims: &Claims, secret: &[u8]) -> Result<String, AuthError> {
    let header = Header::new(Algorithm::HS256);
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::InvalidToken(format!("Encoding failed: {e}")))
}

fn decode_with_secret(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = VALIDATION_LEEWAY_SECS;
    validation.validate_aud = false;
    validation.algorithms = vec![Algorithm::HS256];

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

/// Map jsonwebtoken errors into the crate taxonomy.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => AuthError::InvalidAlgorithm,
        ErrorKind::InvalidToken => AuthError::InvalidToken("Malformed token".to_string()),
        ErrorKind::Base64(_) => AuthError::InvalidToken("Invalid base64 encoding".to_string()),
        ErrorKind::Json(_) => AuthError::InvalidToken("Invalid JSON in claims".to_string()),
        _ => AuthError::InvalidToken(format!("Token validation failed: {err}")),
    }
}

/// One-way digest of a raw token for at-rest storage.
///
/// SHA-256, hex encoded. Used for refresh, verification and reset tokens;
/// the raw value never reaches the store.
#[must_use]
pub fn digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a raw token against a stored digest in constant time.
#[must_use]
pub fn digest_matches(raw: &str, stored_digest: &str) -> bool {
    digest(raw).as_bytes().ct_eq(stored_digest.as_bytes()).into()
}

/// Generate an opaque token for verification and reset flows.
///
/// 32 bytes from the operating system CSPRNG, URL-safe base64 encoded
/// (43 characters). Not a JWT; it carries no claims and is only ever
/// matched by digest.
#[must_use]
pub fn generate_opaque_token() -> String {
    use rand::rngs::OsRng;
    let mut bytes = [0u8; SECURE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig {
            access_secret: b"access-secret-for-tests".to_vec(),
            refresh_secret: b"refresh-secret-for-tests".to_vec(),
        })
    }

    #[test]
    fn issued_pair_round_trips() {
        let id = AccountId::new();
        let tokens = codec().issue_pair(id, "a@example.com").unwrap();

        let access = codec().verify_access(&tokens.access_token).unwrap();
        assert_eq!(access.account_id(), Some(id));
        assert_eq!(access.email, "a@example.com");

        let refresh = codec().verify_refresh(&tokens.refresh_token).unwrap();
        assert_eq!(refresh.account_id(), Some(id));
        assert_eq!(refresh.exp, tokens.refresh_expires_at.timestamp());
    }

    #[test]
    fn access_token_rejected_as_refresh() {
        let tokens = codec().issue_pair(AccountId::new(), "a@example.com").unwrap();
        let err = codec().verify_refresh(&tokens.access_token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let tokens = codec().issue_pair(AccountId::new(), "a@example.com").unwrap();
        let err = codec().verify_access(&tokens.refresh_token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = TokenConfig {
            access_secret: b"access-secret-for-tests".to_vec(),
            refresh_secret: b"refresh-secret-for-tests".to_vec(),
        };
        // Validity far enough in the past to clear the leeway window.
        let codec = TokenCodec::with_validity(
            config,
            Duration::minutes(-5),
            Duration::minutes(-5),
        );
        let tokens = codec.issue_pair(AccountId::new(), "a@example.com").unwrap();

        assert!(matches!(
            codec.verify_access(&tokens.access_token).unwrap_err(),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            codec.verify_refresh(&tokens.refresh_token).unwrap_err(),
            AuthError::TokenExpired
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = codec().issue_pair(AccountId::new(), "a@example.com").unwrap();
        let mut tampered = tokens.refresh_token.clone();
        tampered.pop();
        tampered.push('A');
        assert!(codec().verify_refresh(&tampered).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let err = codec().verify_access("definitely.not.a-jwt").unwrap_err();
        assert!(err.is_token_error());
    }

    #[test]
    fn expires_in_reflects_access_validity() {
        let tokens = codec().issue_pair(AccountId::new(), "a@example.com").unwrap();
        assert_eq!(tokens.expires_in, ACCESS_TOKEN_VALIDITY_MINUTES * 60);
    }

    #[test]
    fn digest_is_deterministic_hex_sha256() {
        let a = digest("token");
        let b = digest("token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest("token"), digest("other"));
    }

    #[test]
    fn digest_matches_constant_time() {
        let raw = generate_opaque_token();
        let stored = digest(&raw);
        assert!(digest_matches(&raw, &stored));
        assert!(!digest_matches("something-else", &stored));
    }

    #[test]
    fn opaque_tokens_are_unique_and_url_safe() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
        assert!(URL_SAFE_NO_PAD.decode(&a).is_ok());
    }

    #[test]
    fn same_second_pairs_have_distinct_digests() {
        let id = AccountId::new();
        let first = codec().issue_pair(id, "a@example.com").unwrap();
        let second = codec().issue_pair(id, "a@example.com").unwrap();
        // jti uniqueness keeps stored digests distinct even when both
        // tokens are minted within the same second.
        assert_ne!(digest(&first.refresh_token), digest(&second.refresh_token));
    }
}
