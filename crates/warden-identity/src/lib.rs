//! Session and credential-security orchestration for warden.
//!
//! This crate ties the primitives from `warden-auth` and the collaborators
//! from `warden-store` into the caller-facing flows:
//!
//! - [`session::SessionManager`] - register, login (with lockout), refresh
//!   rotation, logout and session listing/revocation
//! - [`recovery::RecoveryManager`] - email verification, password reset
//!   and authenticated password change
//! - [`resolver::IdentityResolver`] - access-token claims to the
//!   `{account, roles, permissions}` projection, through the TTL
//!   [`cache::IdentityCache`]
//! - [`lockout::LockoutPolicy`] - the pure lockout state transition
//! - [`mailer::Mailer`] - the outbound email collaborator
//!
//! All collaborators are injected as `Arc<dyn Trait>`; nothing here knows
//! about transports or schedules.

pub mod cache;
pub mod error;
pub mod lockout;
pub mod mailer;
pub mod permissions;
pub mod recovery;
pub mod resolver;
pub mod session;

pub use cache::IdentityCache;
pub use error::{ErrorKind, IdentityError};
pub use lockout::{LockoutOutcome, LockoutPolicy, LOCKOUT_DURATION_MINUTES, MAX_FAILED_ATTEMPTS};
pub use mailer::{Mailer, MailerError, MemoryMailer, ResendMailer, SentEmail, SentEmailKind};
pub use recovery::{RecoveryManager, GENERIC_RESET_MESSAGE, GENERIC_VERIFICATION_MESSAGE};
pub use resolver::{Identity, IdentityResolver};
pub use session::{
    LoginSession, SessionInfo, SessionManager, SessionTokens, MAX_SESSIONS_PER_ACCOUNT,
};
