//! In-memory implementation of the identity store.
//!
//! A single-process backend holding everything behind one mutex, which
//! makes the composite operations trivially atomic. The integration suites
//! run against this backend; it is also usable for embedding and local
//! development. It is not durable.

use crate::error::StoreError;
use crate::models::{
    Account, CreateAccount, CreateRecoveryToken, CreateRefreshToken, RecoveryToken,
    RecoveryTokenKind, RefreshTokenRecord,
};
use crate::page::{Page, PageArgs};
use crate::store::IdentityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;
use warden_core::{AccountId, SessionId};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    /// Insertion order doubles as creation order, which keeps FIFO
    /// eviction stable even when timestamps collide.
    refresh_tokens: Vec<RefreshTokenRecord>,
    recovery_tokens: Vec<(RecoveryTokenKind, RecoveryToken)>,
    /// role name -> permission names
    roles: BTreeMap<String, BTreeSet<String>>,
    /// account id -> granted role names
    grants: HashMap<Uuid, BTreeSet<String>>,
}

/// Identity store backed by process memory.
#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Inner>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a role and its permission set, replacing any prior
    /// definition. Intended for seeding and test setup.
    pub fn insert_role(&self, name: &str, permissions: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.roles.insert(
            name.to_string(),
            permissions.iter().map(|p| (*p).to_string()).collect(),
        );
    }

    /// Number of refresh-token records currently held for an account.
    #[must_use]
    pub fn refresh_token_count(&self, account_id: AccountId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .refresh_tokens
            .iter()
            .filter(|t| t.account_id == *account_id.as_uuid())
            .count()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.get(id.as_uuid()).cloned())
    }

    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.accounts.values().any(|a| a.email == data.email) {
            return Err(StoreError::Conflict(format!("email {}", data.email)));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: data.email,
            password_hash: data.password_hash,
            display_name: data.display_name,
            email_verified: false,
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_lockout_state(
        &self,
        id: AccountId,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = inner
            .accounts
            .get_mut(id.as_uuid())
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        account.failed_attempts = failed_attempts;
        account.locked_until = locked_until;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_role(&self, account_id: AccountId, role_name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        // Unknown roles are created with an empty permission set, the
        // same effect as the Postgres upsert.
        inner.roles.entry(role_name.to_string()).or_default();
        inner
            .grants
            .entry(*account_id.as_uuid())
            .or_default()
            .insert(role_name.to_string());
        Ok(())
    }

    async fn roles_for_account(&self, account_id: AccountId) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .grants
            .get(account_id.as_uuid())
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn permissions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(granted) = inner.grants.get(account_id.as_uuid()) else {
            return Ok(Vec::new());
        };
        let mut permissions = Vec::new();
        for role in granted {
            if let Some(perms) = inner.roles.get(role) {
                permissions.extend(perms.iter().cloned());
            }
        }
        Ok(permissions)
    }

    async fn create_refresh_token(
        &self,
        data: CreateRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            account_id: *data.account_id.as_uuid(),
            token_digest: data.token_digest,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        inner.refresh_tokens.push(record.clone());
        Ok(record)
    }

    async fn prune_refresh_tokens(
        &self,
        account_id: AccountId,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();

        let owned: Vec<Uuid> = inner
            .refresh_tokens
            .iter()
            .filter(|t| t.account_id == account)
            .map(|t| t.id)
            .collect();

        if owned.len() <= keep {
            return Ok(0);
        }

        let surplus: BTreeSet<Uuid> = owned[..owned.len() - keep].iter().copied().collect();
        inner
            .refresh_tokens
            .retain(|t| !surplus.contains(&t.id));
        Ok(surplus.len() as u64)
    }

    async fn rotate_refresh_token(
        &self,
        account_id: AccountId,
        old_digest: &str,
        replacement: CreateRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();

        let position = inner
            .refresh_tokens
            .iter()
            .position(|t| t.account_id == account && t.token_digest == old_digest);

        let Some(position) = position else {
            return Ok(None);
        };

        inner.refresh_tokens.remove(position);
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            account_id: *replacement.account_id.as_uuid(),
            token_digest: replacement.token_digest,
            expires_at: replacement.expires_at,
            created_at: Utc::now(),
        };
        inner.refresh_tokens.push(record.clone());
        Ok(Some(record))
    }

    async fn delete_refresh_tokens_by_digest(&self, digest: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|t| t.token_digest != digest);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }

    async fn delete_refresh_tokens_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|t| t.account_id != account);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }

    async fn list_refresh_tokens(
        &self,
        account_id: AccountId,
        page: PageArgs,
    ) -> Result<Page<RefreshTokenRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();
        let now = Utc::now();

        let live: Vec<RefreshTokenRecord> = inner
            .refresh_tokens
            .iter()
            .filter(|t| t.account_id == account && t.expires_at > now)
            .cloned()
            .collect();

        let total = live.len() as u64;
        let items = live
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.per_page as usize)
            .collect();

        Ok(Page::new(items, page, total))
    }

    async fn delete_refresh_token(
        &self,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();
        let id = *session_id.as_uuid();
        let before = inner.refresh_tokens.len();
        inner
            .refresh_tokens
            .retain(|t| !(t.id == id && t.account_id == account));
        Ok(inner.refresh_tokens.len() < before)
    }

    async fn replace_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        data: CreateRecoveryToken,
    ) -> Result<RecoveryToken, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *data.account_id.as_uuid();

        inner
            .recovery_tokens
            .retain(|(k, t)| !(*k == kind && t.account_id == account));

        let token = RecoveryToken {
            id: Uuid::new_v4(),
            account_id: account,
            token_digest: data.token_digest,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        inner.recovery_tokens.push((kind, token.clone()));
        Ok(token)
    }

    async fn find_live_recovery_token(
        &self,
        kind: RecoveryTokenKind,
        digest: &str,
    ) -> Result<Option<RecoveryToken>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();
        Ok(inner
            .recovery_tokens
            .iter()
            .find(|(k, t)| *k == kind && t.token_digest == digest && t.expires_at > now)
            .map(|(_, t)| t.clone()))
    }

    async fn mark_email_verified(
        &self,
        account_id: AccountId,
        token_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Both checks happen before either write so the pair stays atomic.
        let position = inner
            .recovery_tokens
            .iter()
            .position(|(k, t)| *k == RecoveryTokenKind::Verification && t.id == token_id)
            .ok_or_else(|| StoreError::NotFound(format!("verification token {token_id}")))?;
        let Some(account) = inner.accounts.get_mut(account_id.as_uuid()) else {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        };

        account.email_verified = true;
        account.updated_at = Utc::now();
        inner.recovery_tokens.remove(position);
        Ok(())
    }

    async fn reset_password(
        &self,
        account_id: AccountId,
        token_id: Uuid,
        new_password_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();

        let position = inner
            .recovery_tokens
            .iter()
            .position(|(k, t)| *k == RecoveryTokenKind::Reset && t.id == token_id)
            .ok_or_else(|| StoreError::NotFound(format!("reset token {token_id}")))?;
        let Some(entry) = inner.accounts.get_mut(&account) else {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        };

        entry.password_hash = new_password_hash.to_string();
        entry.updated_at = Utc::now();
        inner.recovery_tokens.remove(position);

        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|t| t.account_id != account);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }

    async fn update_password(
        &self,
        account_id: AccountId,
        new_password_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let account = *account_id.as_uuid();

        let entry = inner
            .accounts
            .get_mut(&account)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;
        entry.password_hash = new_password_hash.to_string();
        entry.updated_at = Utc::now();

        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|t| t.account_id != account);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_data(email: &str) -> CreateAccount {
        CreateAccount {
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "Test".to_string(),
        }
    }

    fn token_data(account_id: AccountId, digest: &str) -> CreateRefreshToken {
        CreateRefreshToken {
            account_id,
            token_digest: digest.to_string(),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryIdentityStore::new();
        store.create_account(create_data("a@x.com")).await.unwrap();
        let err = store.create_account(create_data("a@x.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn prune_evicts_oldest_first() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        for n in 0..5 {
            store
                .create_refresh_token(token_data(id, &format!("digest-{n}")))
                .await
                .unwrap();
        }

        let pruned = store.prune_refresh_tokens(id, 3).await.unwrap();
        assert_eq!(pruned, 2);

        let page = store.list_refresh_tokens(id, PageArgs::default()).await.unwrap();
        let digests: Vec<&str> = page.items.iter().map(|t| t.token_digest.as_str()).collect();
        assert_eq!(digests, vec!["digest-2", "digest-3", "digest-4"]);
    }

    #[tokio::test]
    async fn rotation_is_single_use() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        store.create_refresh_token(token_data(id, "old")).await.unwrap();

        let rotated = store
            .rotate_refresh_token(id, "old", token_data(id, "new"))
            .await
            .unwrap();
        assert!(rotated.is_some());

        // The old digest is gone, so a second rotation finds nothing and
        // writes nothing.
        let replay = store
            .rotate_refresh_token(id, "old", token_data(id, "newer"))
            .await
            .unwrap();
        assert!(replay.is_none());
        assert_eq!(store.refresh_token_count(id), 1);
    }

    #[tokio::test]
    async fn rotation_requires_owning_account() {
        let store = MemoryIdentityStore::new();
        let a = store.create_account(create_data("a@x.com")).await.unwrap();
        let b = store.create_account(create_data("b@x.com")).await.unwrap();

        store
            .create_refresh_token(token_data(a.account_id(), "stolen"))
            .await
            .unwrap();

        let result = store
            .rotate_refresh_token(b.account_id(), "stolen", token_data(b.account_id(), "new"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn replace_recovery_token_keeps_one_active_per_kind() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();
        let expires = Utc::now() + Duration::hours(1);

        for digest in ["first", "second"] {
            store
                .replace_recovery_token(
                    RecoveryTokenKind::Reset,
                    CreateRecoveryToken {
                        account_id: id,
                        token_digest: digest.to_string(),
                        expires_at: expires,
                    },
                )
                .await
                .unwrap();
        }

        assert!(store
            .find_live_recovery_token(RecoveryTokenKind::Reset, "first")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_live_recovery_token(RecoveryTokenKind::Reset, "second")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn expired_recovery_token_is_not_live() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();

        store
            .replace_recovery_token(
                RecoveryTokenKind::Verification,
                CreateRecoveryToken {
                    account_id: account.account_id(),
                    token_digest: "stale".to_string(),
                    expires_at: Utc::now() - Duration::seconds(1),
                },
            )
            .await
            .unwrap();

        assert!(store
            .find_live_recovery_token(RecoveryTokenKind::Verification, "stale")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mark_email_verified_consumes_token() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        let token = store
            .replace_recovery_token(
                RecoveryTokenKind::Verification,
                CreateRecoveryToken {
                    account_id: id,
                    token_digest: "verify".to_string(),
                    expires_at: Utc::now() + Duration::hours(24),
                },
            )
            .await
            .unwrap();

        store.mark_email_verified(id, token.id).await.unwrap();

        let account = store.find_account_by_id(id).await.unwrap().unwrap();
        assert!(account.email_verified);
        assert!(store
            .find_live_recovery_token(RecoveryTokenKind::Verification, "verify")
            .await
            .unwrap()
            .is_none());

        // Replaying the same token id fails and flips nothing.
        let err = store.mark_email_verified(id, token.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn reset_password_revokes_all_sessions() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        store.create_refresh_token(token_data(id, "s1")).await.unwrap();
        store.create_refresh_token(token_data(id, "s2")).await.unwrap();

        let token = store
            .replace_recovery_token(
                RecoveryTokenKind::Reset,
                CreateRecoveryToken {
                    account_id: id,
                    token_digest: "reset".to_string(),
                    expires_at: Utc::now() + Duration::hours(1),
                },
            )
            .await
            .unwrap();

        let revoked = store.reset_password(id, token.id, "$argon2id$new").await.unwrap();
        assert_eq!(revoked, 2);
        assert_eq!(store.refresh_token_count(id), 0);

        let account = store.find_account_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.password_hash, "$argon2id$new");
    }

    #[tokio::test]
    async fn scoped_session_delete_ignores_foreign_accounts() {
        let store = MemoryIdentityStore::new();
        let a = store.create_account(create_data("a@x.com")).await.unwrap();
        let b = store.create_account(create_data("b@x.com")).await.unwrap();

        let record = store
            .create_refresh_token(token_data(a.account_id(), "mine"))
            .await
            .unwrap();

        let deleted = store
            .delete_refresh_token(b.account_id(), record.session_id())
            .await
            .unwrap();
        assert!(!deleted);
        assert_eq!(store.refresh_token_count(a.account_id()), 1);
    }

    #[tokio::test]
    async fn permission_reads_cross_roles() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        store.insert_role("user", &["profile:read", "profile:update:own"]);
        store.insert_role("auditor", &["audit:log:read", "profile:read"]);
        store.assign_role(id, "user").await.unwrap();
        store.assign_role(id, "auditor").await.unwrap();

        let roles = store.roles_for_account(id).await.unwrap();
        assert_eq!(roles, vec!["auditor", "user"]);

        // Duplicates across roles are preserved here; the resolver unions.
        let perms = store.permissions_for_account(id).await.unwrap();
        assert_eq!(perms.iter().filter(|p| *p == "profile:read").count(), 2);
    }

    #[tokio::test]
    async fn list_pages_live_tokens_oldest_first() {
        let store = MemoryIdentityStore::new();
        let account = store.create_account(create_data("a@x.com")).await.unwrap();
        let id = account.account_id();

        for n in 0..3 {
            store
                .create_refresh_token(token_data(id, &format!("live-{n}")))
                .await
                .unwrap();
        }
        // An expired record never shows up in listings.
        store
            .create_refresh_token(CreateRefreshToken {
                account_id: id,
                token_digest: "expired".to_string(),
                expires_at: Utc::now() - Duration::seconds(1),
            })
            .await
            .unwrap();

        let page = store
            .list_refresh_tokens(id, PageArgs::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].token_digest, "live-0");
        assert_eq!(page.items[1].token_digest, "live-1");
    }
}
