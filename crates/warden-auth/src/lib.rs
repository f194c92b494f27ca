//! Credential and token primitives for the warden identity core.
//!
//! This crate owns the two cryptographic seams of the system:
//!
//! - [`password`] - one-way password hashing and verification (Argon2id)
//! - [`token`] - the signed-token codec: short-lived access tokens and
//!   longer-lived refresh tokens signed with distinct secrets, plus the
//!   one-way digest used to store refresh and recovery tokens at rest
//!
//! Nothing here touches storage; callers persist digests, never raw values.

pub mod claims;
pub mod error;
pub mod password;
pub mod token;

pub use claims::{Claims, ClaimsBuilder};
pub use error::AuthError;
pub use password::PasswordHasher;
pub use token::{
    digest, digest_matches, generate_opaque_token, IssuedTokens, TokenCodec, TokenConfig,
    ACCESS_TOKEN_VALIDITY_MINUTES, EMAIL_VERIFICATION_TOKEN_VALIDITY_HOURS,
    PASSWORD_RESET_TOKEN_VALIDITY_HOURS, REFRESH_TOKEN_VALIDITY_DAYS, SECURE_TOKEN_BYTES,
};
