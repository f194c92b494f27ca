//! The `IdentityStore` capability trait.
//!
//! Everything the orchestration layer needs from durable storage, as one
//! injected interface. The multi-statement sequences that must not be
//! observable half-done (email verification, password reset and change,
//! refresh-token rotation) are composite methods here, so each backend
//! owns its own transaction boundary: the Postgres backend wraps them in a
//! database transaction, the in-memory backend holds its lock across the
//! whole operation.

use crate::error::StoreError;
use crate::models::{
    Account, CreateAccount, CreateRecoveryToken, CreateRefreshToken, RecoveryToken,
    RecoveryTokenKind, RefreshTokenRecord,
};
use crate::page::{Page, PageArgs};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_core::{AccountId, SessionId};

/// Durable storage for accounts, token records and the role graph.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    // ---- accounts ----

    /// Find an account by normalized email.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Find an account by id.
    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Create an account.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if the email is already registered.
    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError>;

    /// Persist a lockout transition: the failure counter and lock expiry
    /// are always written together.
    async fn update_lockout_state(
        &self,
        id: AccountId,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    // ---- roles ----

    /// Grant a role to an account by role name. Granting an already-held
    /// role is a no-op.
    async fn assign_role(&self, account_id: AccountId, role_name: &str) -> Result<(), StoreError>;

    /// All role names granted to an account.
    async fn roles_for_account(&self, account_id: AccountId) -> Result<Vec<String>, StoreError>;

    /// All permission names reachable through the account's roles.
    /// May contain duplicates across roles; callers union them.
    async fn permissions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<String>, StoreError>;

    // ---- refresh tokens ----

    /// Store a refresh-token record.
    async fn create_refresh_token(
        &self,
        data: CreateRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Delete the account's oldest records until at most `keep` remain,
    /// ordered by creation time (FIFO eviction). Returns the number
    /// deleted.
    async fn prune_refresh_tokens(
        &self,
        account_id: AccountId,
        keep: usize,
    ) -> Result<u64, StoreError>;

    /// Rotate a refresh token: atomically delete the record matching
    /// `old_digest` and the owning account, and store `replacement`.
    ///
    /// Returns `None` without writing anything when no matching record
    /// exists. That absence is how a replayed, already-rotated token is
    /// detected.
    async fn rotate_refresh_token(
        &self,
        account_id: AccountId,
        old_digest: &str,
        replacement: CreateRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Delete every record matching a digest. Returns the number deleted;
    /// zero is not an error (logout is idempotent).
    async fn delete_refresh_tokens_by_digest(&self, digest: &str) -> Result<u64, StoreError>;

    /// Delete every record owned by an account. Returns the number
    /// deleted.
    async fn delete_refresh_tokens_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<u64, StoreError>;

    /// Page through the account's live (non-expired) records, oldest
    /// first.
    async fn list_refresh_tokens(
        &self,
        account_id: AccountId,
        page: PageArgs,
    ) -> Result<Page<RefreshTokenRecord>, StoreError>;

    /// Delete one record scoped to its owning account. Returns false when
    /// the record does not exist or belongs to another account.
    async fn delete_refresh_token(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<bool, StoreError>;

    // ---- recovery tokens ----

    /// Issue a recovery token of the given kind, atomically deleting any
    /// prior tokens of that kind for the account first.
    async fn replace_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        data: CreateRecoveryToken,
    ) -> Result<RecoveryToken, StoreError>;

    /// Find a non-expired recovery token of the given kind by digest.
    async fn find_live_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        digest: &str,
    ) -> Result<Option<RecoveryToken>, StoreError>;

    // ---- atomic composites ----

    /// Mark the account's email verified and delete the verification
    /// token record, as one unit. Neither write survives alone.
    async fn mark_email_verified(
        &self,
        account_id: AccountId,
        token_id: uuid::Uuid,
    ) -> Result<(), StoreError>;

    /// Store a new password hash, delete the reset-token record and delete
    /// every refresh-token record for the account, as one unit. Returns
    /// the number of sessions revoked.
    async fn reset_password(
        &self,
        account_id: AccountId,
        token_id: uuid::Uuid,
        new_password_hash: &str,
    ) -> Result<u64, StoreError>;

    /// Store a new password hash and delete every refresh-token record for
    /// the account, as one unit (the authenticated change-password path).
    /// Returns the number of sessions revoked.
    async fn update_password(
        &self,
        account_id: AccountId,
        new_password_hash: &str,
    ) -> Result<u64, StoreError>;
}
