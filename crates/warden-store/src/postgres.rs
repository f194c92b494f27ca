//! Postgres implementation of the identity store.
//!
//! Expects the following tables: `accounts`, `refresh_tokens`,
//! `recovery_tokens` (with a `kind` text column), `roles`,
//! `role_permissions`, `permissions` and `account_roles`. Schema
//! provisioning lives with the deployment, not this crate.

use crate::error::StoreError;
use crate::models::{
    Account, CreateAccount, CreateRecoveryToken, CreateRefreshToken, RecoveryToken,
    RecoveryTokenKind, RefreshTokenRecord,
};
use crate::page::{Page, PageArgs};
use crate::store::IdentityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use warden_core::{AccountId, SessionId};

/// Identity store backed by Postgres via sqlx.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and create a store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(StoreError::Connection)?;
        Ok(Self::new(pool))
    }

    /// Access the underlying pool (shared with the audit sink).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as(
            r"
            SELECT id, email, password_hash, display_name, email_verified,
                   failed_attempts, locked_until, created_at, updated_at
            FROM accounts
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as(
            r"
            SELECT id, email, password_hash, display_name, email_verified,
                   failed_attempts, locked_until, created_at, updated_at
            FROM accounts
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError> {
        let id = uuid::Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r"
            INSERT INTO accounts
                (id, email, password_hash, display_name, email_verified,
                 failed_attempts, locked_until, created_at, updated_at)
            VALUES ($1, $2, $3, $4, false, 0, NULL, $5, $5)
            ",
        )
        .bind(id)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.display_name)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Account {
                id,
                email: data.email,
                password_hash: data.password_hash,
                display_name: data.display_name,
                email_verified: false,
                failed_attempts: 0,
                locked_until: None,
                created_at: now,
                updated_at: now,
            }),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::Conflict(format!("email {}", data.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_lockout_state(
        &self,
        id: AccountId,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE accounts
            SET failed_attempts = $2, locked_until = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(failed_attempts)
        .bind(locked_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn assign_role(&self, account_id: AccountId, role_name: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(uuid::Uuid::new_v4())
            .bind(role_name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO account_roles (account_id, role_id, created_at)
            SELECT $1, id, NOW() FROM roles WHERE name = $2
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(account_id.as_uuid())
        .bind(role_name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn roles_for_account(&self, account_id: AccountId) -> Result<Vec<String>, StoreError> {
        let roles = sqlx::query_scalar(
            r"
            SELECT r.name
            FROM roles r
            JOIN account_roles ar ON ar.role_id = r.id
            WHERE ar.account_id = $1
            ORDER BY r.name
            ",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn permissions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<String>, StoreError> {
        let permissions = sqlx::query_scalar(
            r"
            SELECT p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN account_roles ar ON ar.role_id = rp.role_id
            WHERE ar.account_id = $1
            ",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn create_refresh_token(
        &self,
        data: CreateRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let id = uuid::Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO refresh_tokens (id, account_id, token_digest, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id)
        .bind(data.account_id.as_uuid())
        .bind(&data.token_digest)
        .bind(data.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(RefreshTokenRecord {
            id,
            account_id: *data.account_id.as_uuid(),
            token_digest: data.token_digest,
            expires_at: data.expires_at,
            created_at: now,
        })
    }

    async fn prune_refresh_tokens(
        &self,
        account_id: AccountId,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            DELETE FROM refresh_tokens
            WHERE account_id = $1
              AND id NOT IN (
                  SELECT id FROM refresh_tokens
                  WHERE account_id = $1
                  ORDER BY created_at DESC, id DESC
                  LIMIT $2
              )
            ",
        )
        .bind(account_id.as_uuid())
        .bind(i64::try_from(keep).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn rotate_refresh_token(
        &self,
        account_id: AccountId,
        old_digest: &str,
        replacement: CreateRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM refresh_tokens WHERE token_digest = $1 AND account_id = $2",
        )
        .bind(old_digest)
        .bind(account_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            // Nothing to rotate: the token was already rotated or revoked.
            // Dropping the transaction rolls back.
            return Ok(None);
        }

        let id = uuid::Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO refresh_tokens (id, account_id, token_digest, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id)
        .bind(replacement.account_id.as_uuid())
        .bind(&replacement.token_digest)
        .bind(replacement.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(RefreshTokenRecord {
            id,
            account_id: *replacement.account_id.as_uuid(),
            token_digest: replacement.token_digest,
            expires_at: replacement.expires_at,
            created_at: now,
        }))
    }

    async fn delete_refresh_tokens_by_digest(&self, digest: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_digest = $1")
            .bind(digest)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_refresh_tokens_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
            .bind(account_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_refresh_tokens(
        &self,
        account_id: AccountId,
        page: PageArgs,
    ) -> Result<Page<RefreshTokenRecord>, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM refresh_tokens
            WHERE account_id = $1 AND expires_at > NOW()
            ",
        )
        .bind(account_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as(
            r"
            SELECT id, account_id, token_digest, expires_at, created_at
            FROM refresh_tokens
            WHERE account_id = $1 AND expires_at > NOW()
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(account_id.as_uuid())
        .bind(i64::from(page.per_page))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, total.max(0) as u64))
    }

    async fn delete_refresh_token(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE id = $1 AND account_id = $2")
                .bind(session_id.as_uuid())
                .bind(account_id.as_uuid())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        data: CreateRecoveryToken,
    ) -> Result<RecoveryToken, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recovery_tokens WHERE account_id = $1 AND kind = $2")
            .bind(data.account_id.as_uuid())
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

        let id = uuid::Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO recovery_tokens (id, account_id, kind, token_digest, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(id)
        .bind(data.account_id.as_uuid())
        .bind(kind.as_str())
        .bind(&data.token_digest)
        .bind(data.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RecoveryToken {
            id,
            account_id: *data.account_id.as_uuid(),
            token_digest: data.token_digest,
            expires_at: data.expires_at,
            created_at: now,
        })
    }

    async fn find_live_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        digest: &str,
    ) -> Result<Option<RecoveryToken>, StoreError> {
        let token = sqlx::query_as(
            r"
            SELECT id, account_id, token_digest, expires_at, created_at
            FROM recovery_tokens
            WHERE kind = $1 AND token_digest = $2 AND expires_at > NOW()
            ",
        )
        .bind(kind.as_str())
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn mark_email_verified(
        &self,
        account_id: AccountId,
        token_id: uuid::Uuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE accounts SET email_verified = true, updated_at = NOW() WHERE id = $1",
        )
        .bind(account_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }

        let deleted = sqlx::query(
            "DELETE FROM recovery_tokens WHERE id = $1 AND kind = 'verification'",
        )
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "verification token {token_id}"
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reset_password(
        &self,
        account_id: AccountId,
        token_id: uuid::Uuid,
        new_password_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(account_id.as_uuid())
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }

        let deleted = sqlx::query("DELETE FROM recovery_tokens WHERE id = $1 AND kind = 'reset'")
            .bind(token_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("reset token {token_id}")));
        }

        let revoked = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
            .bind(account_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(revoked.rows_affected())
    }

    async fn update_password(
        &self,
        account_id: AccountId,
        new_password_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(account_id.as_uuid())
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }

        let revoked = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
            .bind(account_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(revoked.rows_affected())
    }
}

/// Check whether a sqlx error is a unique-constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
