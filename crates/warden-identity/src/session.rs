//! Session management.
//!
//! Orchestrates registration, login, refresh rotation, logout and session
//! listing/revocation. Every refresh token moves through exactly one of
//! three exits: rotated (redeemed once for a new pair), revoked
//! (logout or explicit revocation) or expired. The stored record is
//! deleted at that moment, which is what makes a replayed token
//! detectable.

use crate::cache::IdentityCache;
use crate::error::IdentityError;
use crate::lockout::{LockoutOutcome, LockoutPolicy};
use crate::mailer::Mailer;
use crate::recovery::issue_recovery_token;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_auth::token::{self, EMAIL_VERIFICATION_TOKEN_VALIDITY_HOURS};
use warden_auth::{PasswordHasher, TokenCodec};
use warden_core::{AccountId, SessionId};
use warden_store::models::role::DEFAULT_ROLE;
use warden_store::{
    Account, AuditSink, CreateAccount, CreateRefreshToken, IdentityStore, Page, PageArgs,
    RecoveryTokenKind, RefreshTokenRecord,
};

/// Live sessions an account may hold at once. The oldest records are
/// evicted first when the limit is exceeded.
pub const MAX_SESSIONS_PER_ACCOUNT: usize = 10;

/// An issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token; single-use under rotation.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// A successful login: the token pair plus the authenticated account.
#[derive(Debug, Clone)]
pub struct LoginSession {
    /// The issued pair.
    pub tokens: SessionTokens,
    /// The account, with its failure counters already reset.
    pub account: Account,
}

/// A live session as listed to its owner. The token digest stays
/// internal.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session identifier, usable with revocation.
    pub id: SessionId,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
    /// When the session expires on its own.
    pub expires_at: DateTime<Utc>,
}

impl From<RefreshTokenRecord> for SessionInfo {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.session_id(),
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// Orchestrates credential authentication and session lifecycle.
pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<IdentityCache>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    lockout: LockoutPolicy,
    max_sessions: usize,
}

impl SessionManager {
    /// Create a manager with the default lockout policy, hasher and
    /// session limit.
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditSink>,
        cache: Arc<IdentityCache>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            store,
            mailer,
            audit,
            cache,
            codec,
            hasher: PasswordHasher::new(),
            lockout: LockoutPolicy::new(),
            max_sessions: MAX_SESSIONS_PER_ACCOUNT,
        }
    }

    /// Override the lockout policy.
    #[must_use]
    pub fn with_lockout_policy(mut self, policy: LockoutPolicy) -> Self {
        self.lockout = policy;
        self
    }

    /// Override the password hasher (tests use cheaper parameters).
    #[must_use]
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Override the per-account session limit.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Register a new account.
    ///
    /// The account starts unverified with the default role granted. A
    /// verification token goes out through the mailer; a delivery failure
    /// is logged and does not undo the registration.
    ///
    /// # Errors
    ///
    /// `IdentityError::EmailInUse` when the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account, IdentityError> {
        let email = normalize_email(email);

        if self.store.find_account_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailInUse);
        }

        let password_hash = self.hasher.hash(password)?;

        let account = match self
            .store
            .create_account(CreateAccount {
                email,
                password_hash,
                display_name: display_name.to_string(),
            })
            .await
        {
            Ok(account) => account,
            // A concurrent registration can slip between the existence
            // check and the insert; surface it the same way.
            Err(e) if e.is_conflict() => return Err(IdentityError::EmailInUse),
            Err(e) => return Err(e.into()),
        };

        let account_id = account.account_id();
        self.store.assign_role(account_id, DEFAULT_ROLE).await?;

        let raw_token = issue_recovery_token(
            self.store.as_ref(),
            RecoveryTokenKind::Verification,
            account_id,
            Duration::hours(EMAIL_VERIFICATION_TOKEN_VALIDITY_HOURS),
        )
        .await?;

        if let Err(e) = self
            .mailer
            .send_verification_email(&account.email, &account.display_name, &raw_token)
            .await
        {
            warn!(account_id = %account_id, "Verification email failed: {e}");
        }

        self.audit(
            "user.create",
            Some(account_id),
            Some(account_id),
            Some(json!({ "email": account.email, "name": account.display_name })),
        )
        .await;

        info!(account_id = %account_id, "Account registered");
        Ok(account)
    }

    /// Authenticate credentials and establish a session.
    ///
    /// Unknown email and wrong password fail identically. Lockout
    /// transitions are persisted before this returns, and the locked
    /// notification goes out only on the attempt that acquires the lock.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidCredentials` - unknown email or wrong
    ///   password (including the attempt that just locked the account)
    /// - `IdentityError::AccountLocked` - rejected while a lock is active
    /// - `IdentityError::EmailNotVerified` - correct credentials, email
    ///   not confirmed yet
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, IdentityError> {
        let email = normalize_email(email);

        let Some(mut account) = self.store.find_account_by_email(&email).await? else {
            debug!("Login attempt for unknown email");
            return Err(IdentityError::InvalidCredentials);
        };
        let account_id = account.account_id();
        let now = Utc::now();

        // While locked the password is not even checked.
        if let Some(minutes) = self
            .lockout
            .remaining_lock_minutes(now, account.locked_until)
        {
            debug!(account_id = %account_id, "Login attempt while locked");
            return Err(IdentityError::AccountLocked { minutes });
        }

        let password_ok = self.hasher.verify(password, &account.password_hash)?;

        match self
            .lockout
            .assess(now, account.failed_attempts, account.locked_until, password_ok)
        {
            // Cold arm: the pre-check above already rejected active locks.
            LockoutOutcome::Locked { remaining_minutes } => Err(IdentityError::AccountLocked {
                minutes: remaining_minutes,
            }),
            LockoutOutcome::BadCredentials { failed_attempts } => {
                self.store
                    .update_lockout_state(account_id, failed_attempts, None)
                    .await?;
                self.audit(
                    "login.failed",
                    None,
                    Some(account_id),
                    Some(json!({ "email": account.email })),
                )
                .await;
                debug!(account_id = %account_id, failed_attempts, "Invalid password");
                Err(IdentityError::InvalidCredentials)
            }
            LockoutOutcome::NowLocked {
                failed_attempts,
                locked_until,
            } => {
                self.store
                    .update_lockout_state(account_id, failed_attempts, Some(locked_until))
                    .await?;

                if let Err(e) = self
                    .mailer
                    .send_account_locked_email(&account.email, &account.display_name)
                    .await
                {
                    warn!(account_id = %account_id, "Locked email failed: {e}");
                }
                self.audit(
                    "login.locked",
                    None,
                    Some(account_id),
                    Some(json!({ "email": account.email })),
                )
                .await;

                warn!(
                    account_id = %account_id,
                    failed_attempts,
                    locked_until = %locked_until,
                    "Account locked after repeated failures"
                );
                Err(IdentityError::InvalidCredentials)
            }
            LockoutOutcome::Accepted => {
                self.store.update_lockout_state(account_id, 0, None).await?;
                account.failed_attempts = 0;
                account.locked_until = None;

                if !account.email_verified {
                    debug!(account_id = %account_id, "Login with unverified email");
                    return Err(IdentityError::EmailNotVerified);
                }

                let tokens = self.establish_session(account_id, &account.email).await?;

                self.audit("login.success", Some(account_id), Some(account_id), None)
                    .await;
                info!(account_id = %account_id, "Login succeeded");

                Ok(LoginSession { tokens, account })
            }
        }
    }

    /// Redeem a refresh token for a brand-new pair.
    ///
    /// Rotation is single-use: the stored record is deleted in the same
    /// atomic unit that stores its replacement, so presenting the same raw
    /// token again finds nothing and fails.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidToken` - signature or expiry failure
    /// - `IdentityError::TokenRevoked` - structurally valid but no longer
    ///   recognized (already rotated, revoked or swept)
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<SessionTokens, IdentityError> {
        let claims = self.codec.verify_refresh(raw_refresh_token)?;
        let account_id = claims.account_id().ok_or(IdentityError::InvalidToken)?;

        let issued = self.codec.issue_pair(account_id, &claims.email)?;
        let replacement = CreateRefreshToken {
            account_id,
            token_digest: token::digest(&issued.refresh_token),
            expires_at: issued.refresh_expires_at,
        };

        let rotated = self
            .store
            .rotate_refresh_token(account_id, &token::digest(raw_refresh_token), replacement)
            .await?;

        if rotated.is_none() {
            warn!(account_id = %account_id, "Replayed or revoked refresh token");
            return Err(IdentityError::TokenRevoked);
        }

        self.audit("token.refreshed", Some(account_id), Some(account_id), None)
            .await;
        debug!(account_id = %account_id, "Refresh token rotated");

        Ok(SessionTokens {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_in: issued.expires_in,
        })
    }

    /// Invalidate a refresh token. Idempotent: logging out a token that is
    /// already unknown is not an error.
    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), IdentityError> {
        // Best-effort actor attribution; the delete is keyed on the
        // digest and works for undecodable tokens too.
        let actor = self
            .codec
            .verify_refresh(raw_refresh_token)
            .ok()
            .and_then(|claims| claims.account_id());

        let deleted = self
            .store
            .delete_refresh_tokens_by_digest(&token::digest(raw_refresh_token))
            .await?;

        if deleted > 0 {
            self.audit("logout", actor, actor, None).await;
        }
        debug!(deleted, "Logout processed");
        Ok(())
    }

    /// Revoke every session the account holds. Returns how many were
    /// revoked.
    pub async fn logout_all(&self, account_id: AccountId) -> Result<u64, IdentityError> {
        let revoked = self
            .store
            .delete_refresh_tokens_for_account(account_id)
            .await?;

        self.audit("logout.all", Some(account_id), Some(account_id), None)
            .await;
        info!(account_id = %account_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Page through the account's live sessions, oldest first.
    pub async fn list_sessions(
        &self,
        account_id: AccountId,
        page: PageArgs,
    ) -> Result<Page<SessionInfo>, IdentityError> {
        let records = self.store.list_refresh_tokens(account_id, page).await?;
        Ok(records.map(SessionInfo::from))
    }

    /// Revoke one session, scoped to its owner.
    ///
    /// # Errors
    ///
    /// `IdentityError::SessionNotFound` when the id does not exist or
    /// belongs to another account.
    pub async fn revoke_session(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<(), IdentityError> {
        let deleted = self
            .store
            .delete_refresh_token(account_id, session_id)
            .await?;

        if !deleted {
            return Err(IdentityError::SessionNotFound);
        }

        self.audit("session.revoked", Some(account_id), Some(account_id), None)
            .await;
        info!(account_id = %account_id, session_id = %session_id, "Session revoked");
        Ok(())
    }

    /// Issue a pair, persist the refresh digest and enforce the session
    /// limit by FIFO eviction.
    async fn establish_session(
        &self,
        account_id: AccountId,
        email: &str,
    ) -> Result<SessionTokens, IdentityError> {
        let issued = self.codec.issue_pair(account_id, email)?;

        self.store
            .create_refresh_token(CreateRefreshToken {
                account_id,
                token_digest: token::digest(&issued.refresh_token),
                expires_at: issued.refresh_expires_at,
            })
            .await?;

        let evicted = self
            .store
            .prune_refresh_tokens(account_id, self.max_sessions)
            .await?;
        if evicted > 0 {
            info!(account_id = %account_id, evicted, "Evicted oldest sessions over limit");
        }

        Ok(SessionTokens {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_in: issued.expires_in,
        })
    }

    /// Fire-and-forget audit write.
    async fn audit(
        &self,
        action: &str,
        actor: Option<AccountId>,
        target: Option<AccountId>,
        metadata: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .audit
            .log(action, actor, target, "account", metadata)
            .await
        {
            warn!(action, "Audit write failed: {e}");
        }
    }

    /// Shared cache handle, for wiring the resolver.
    #[must_use]
    pub fn cache(&self) -> Arc<IdentityCache> {
        self.cache.clone()
    }
}

/// Lowercase and trim an email address before any lookup or insert.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
