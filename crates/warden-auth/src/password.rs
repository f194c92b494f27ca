//! Password hashing with Argon2id.
//!
//! Digests are PHC strings and therefore self-describing: the parameters a
//! digest was produced with are embedded in it, so tuning the configured
//! cost never invalidates previously stored digests.

use crate::error::AuthError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// One-way password hasher.
///
/// Defaults to the OWASP 2024 recommended Argon2id parameters
/// (m=19456 KiB, t=2, p=1). The plaintext is never logged or returned.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // m=19456 (19 MiB), t=2, p=1. These constants are always valid;
        // a failure here would be a bug in the argon2 crate itself.
        let params = Params::new(19_456, 2, 1, None)
            .expect("OWASP Argon2id parameters are valid constants");
        Self { params }
    }
}

impl PasswordHasher {
    /// Create a hasher with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher with custom cost parameters.
    ///
    /// Mostly useful in tests, where the default memory cost is
    /// unnecessarily slow.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingFailed` if the parameters are rejected.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::HashingFailed(format!("Invalid parameters: {e}")))?;
        Ok(Self { params })
    }

    /// Hash a plaintext password.
    ///
    /// Every call generates a fresh random salt, so hashing the same
    /// password twice yields different digests.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingFailed` if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::HashingFailed(e.to_string()))
    }

    /// Verify a plaintext password against a stored digest.
    ///
    /// Returns `Ok(false)` on mismatch; only a malformed digest is an error.
    /// Verification reads the parameters out of the PHC string, not out of
    /// this hasher's configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidHashFormat` if `digest` is not a valid
    /// PHC string.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(digest).map_err(|_| AuthError::InvalidHashFormat)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        match argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low-cost parameters so the suite stays fast.
    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(4096, 1, 1).unwrap()
    }

    #[test]
    fn hash_produces_phc_argon2id() {
        let digest = hasher().hash("correct horse battery staple").unwrap();
        assert!(digest.starts_with("$argon2id$"));
    }

    #[test]
    fn verify_accepts_matching_password() {
        let h = hasher();
        let digest = h.hash("s3cret!").unwrap();
        assert!(h.verify("s3cret!", &digest).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let h = hasher();
        let digest = h.hash("s3cret!").unwrap();
        assert!(!h.verify("not-it", &digest).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_digest() {
        let err = hasher().verify("whatever", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AuthError::InvalidHashFormat));
    }

    #[test]
    fn salts_differ_between_calls() {
        let h = hasher();
        let a = h.hash("same").unwrap();
        let b = h.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(h.verify("same", &a).unwrap());
        assert!(h.verify("same", &b).unwrap());
    }

    #[test]
    fn digest_is_self_describing_across_cost_changes() {
        // A digest written under one cost still verifies under another.
        let old = PasswordHasher::with_params(4096, 1, 1).unwrap();
        let new = PasswordHasher::with_params(8192, 2, 1).unwrap();
        let digest = old.hash("migrated").unwrap();
        assert!(new.verify("migrated", &digest).unwrap());
    }

    #[test]
    fn handles_unicode_passwords() {
        let h = hasher();
        let digest = h.hash("пароль日本語🔐").unwrap();
        assert!(h.verify("пароль日本語🔐", &digest).unwrap());
        assert!(!h.verify("wrong", &digest).unwrap());
    }
}
