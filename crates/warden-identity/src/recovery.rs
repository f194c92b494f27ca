//! Credential recovery.
//!
//! Email verification and password reset, plus the authenticated
//! change-password path. The request endpoints answer with one generic
//! message whether or not the email exists, so they leak nothing about
//! which addresses hold accounts.

use crate::cache::IdentityCache;
use crate::error::IdentityError;
use crate::mailer::Mailer;
use crate::session::normalize_email;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_auth::token::{
    self, EMAIL_VERIFICATION_TOKEN_VALIDITY_HOURS, PASSWORD_RESET_TOKEN_VALIDITY_HOURS,
};
use warden_auth::PasswordHasher;
use warden_core::AccountId;
use warden_store::{AuditSink, CreateRecoveryToken, IdentityStore, RecoveryTokenKind};

/// The answer every password-reset request gets, match or not.
pub const GENERIC_RESET_MESSAGE: &str =
    "If an account with this email exists, a reset link has been sent";

/// The answer every verification request gets, match or not.
pub const GENERIC_VERIFICATION_MESSAGE: &str =
    "If an unverified account with this email exists, a new link has been sent";

/// Orchestrates verification and reset token issuance and redemption.
pub struct RecoveryManager {
    store: Arc<dyn IdentityStore>,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<IdentityCache>,
    hasher: PasswordHasher,
}

impl RecoveryManager {
    /// Create a manager with the default hasher.
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditSink>,
        cache: Arc<IdentityCache>,
    ) -> Self {
        Self {
            store,
            mailer,
            audit,
            cache,
            hasher: PasswordHasher::new(),
        }
    }

    /// Override the password hasher (tests use cheaper parameters).
    #[must_use]
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Request a fresh email-verification link.
    ///
    /// Always returns [`GENERIC_VERIFICATION_MESSAGE`]. A token is issued
    /// and mailed only when the email belongs to an unverified account;
    /// any prior verification token is replaced.
    pub async fn request_verification(
        &self,
        email: &str,
    ) -> Result<&'static str, IdentityError> {
        let email = normalize_email(email);

        match self.store.find_account_by_email(&email).await? {
            Some(account) if !account.email_verified => {
                let account_id = account.account_id();
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
            }
            _ => {
                // Unknown or already verified: answer identically.
                debug!("Verification requested for non-matching email");
            }
        }

        Ok(GENERIC_VERIFICATION_MESSAGE)
    }

    /// Request a password-reset link.
    ///
    /// Always returns [`GENERIC_RESET_MESSAGE`]. On a real match any prior
    /// reset token is replaced and the raw token goes out by mail.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<&'static str, IdentityError> {
        let email = normalize_email(email);

        if let Some(account) = self.store.find_account_by_email(&email).await? {
            let account_id = account.account_id();
            let raw_token = issue_recovery_token(
                self.store.as_ref(),
                RecoveryTokenKind::Reset,
                account_id,
                Duration::hours(PASSWORD_RESET_TOKEN_VALIDITY_HOURS),
            )
            .await?;

            if let Err(e) = self
                .mailer
                .send_password_reset_email(&account.email, &account.display_name, &raw_token)
                .await
            {
                warn!(account_id = %account_id, "Reset email failed: {e}");
            }
        } else {
            debug!("Reset requested for unknown email");
        }

        Ok(GENERIC_RESET_MESSAGE)
    }

    /// Redeem a verification token.
    ///
    /// Marks the account verified and consumes the token record in one
    /// atomic unit.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidToken` when no live record matches.
    pub async fn verify_email(&self, raw_token: &str) -> Result<(), IdentityError> {
        let record = self
            .store
            .find_live_recovery_token(RecoveryTokenKind::Verification, &token::digest(raw_token))
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        if !token::digest_matches(raw_token, &record.token_digest) {
            return Err(IdentityError::InvalidToken);
        }

        let account_id = record.account_id();
        self.store.mark_email_verified(account_id, record.id).await?;
        self.cache.invalidate(account_id).await;

        self.audit("email.verified", Some(account_id), Some(account_id))
            .await;
        info!(account_id = %account_id, "Email verified");
        Ok(())
    }

    /// Redeem a reset token for a new password.
    ///
    /// Stores the new hash, consumes the token and revokes every live
    /// session for the account in one atomic unit.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidToken` when no live record matches.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let record = self
            .store
            .find_live_recovery_token(RecoveryTokenKind::Reset, &token::digest(raw_token))
            .await?
            .ok_or(IdentityError::InvalidToken)?;

        if !token::digest_matches(raw_token, &record.token_digest) {
            return Err(IdentityError::InvalidToken);
        }

        let account_id = record.account_id();
        let new_hash = self.hasher.hash(new_password)?;

        let revoked = self
            .store
            .reset_password(account_id, record.id, &new_hash)
            .await?;
        self.cache.invalidate(account_id).await;

        self.audit("password.reset", Some(account_id), Some(account_id))
            .await;
        info!(account_id = %account_id, revoked, "Password reset, sessions revoked");
        Ok(())
    }

    /// Change the password of an authenticated account.
    ///
    /// Verifies the current password first, then applies the same atomic
    /// update-and-revoke-all as the reset path.
    ///
    /// # Errors
    ///
    /// - `IdentityError::AccountNotFound` - no such account
    /// - `IdentityError::InvalidCredentials` - current password mismatch
    pub async fn change_password(
        &self,
        account_id: AccountId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        let account = self
            .store
            .find_account_by_id(account_id)
            .await?
            .ok_or(IdentityError::AccountNotFound)?;

        if !self
            .hasher
            .verify(current_password, &account.password_hash)?
        {
            debug!(account_id = %account_id, "Password change with wrong current password");
            return Err(IdentityError::InvalidCredentials);
        }

        let new_hash = self.hasher.hash(new_password)?;
        let revoked = self.store.update_password(account_id, &new_hash).await?;
        self.cache.invalidate(account_id).await;

        self.audit("password.changed", Some(account_id), Some(account_id))
            .await;
        info!(account_id = %account_id, revoked, "Password changed, sessions revoked");
        Ok(())
    }

    /// Fire-and-forget audit write.
    async fn audit(&self, action: &str, actor: Option<AccountId>, target: Option<AccountId>) {
        if let Err(e) = self.audit.log(action, actor, target, "account", None).await {
            warn!(action, "Audit write failed: {e}");
        }
    }
}

/// Generate, store and return a raw recovery token.
///
/// Any prior token of the same kind for the account is deleted in the
/// same store operation, so at most one stays active.
pub(crate) async fn issue_recovery_token(
    store: &dyn IdentityStore,
    kind: RecoveryTokenKind,
    account_id: AccountId,
    validity: Duration,
) -> Result<String, IdentityError> {
    let raw = token::generate_opaque_token();
    store
        .replace_recovery_token(
            kind,
            CreateRecoveryToken {
                account_id,
                token_digest: token::digest(&raw),
                expires_at: Utc::now() + validity,
            },
        )
        .await?;
    Ok(raw)
}
