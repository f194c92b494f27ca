//! Identity resolution for authorization.
//!
//! Turns verified access-token claims into the flattened
//! `{account, roles, permissions}` projection an authorization layer
//! checks against. Reads go through the identity cache; misses load from
//! the store and populate it.

use crate::cache::IdentityCache;
use crate::error::IdentityError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use warden_auth::Claims;
use warden_store::{Account, IdentityStore};

/// A resolved caller identity.
///
/// `permissions` is the de-duplicated union across all granted roles,
/// sorted for stable comparison.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The account itself.
    pub account: Account,
    /// Names of all granted roles.
    pub roles: Vec<String>,
    /// Union of all permission names across those roles.
    pub permissions: Vec<String>,
}

impl Identity {
    /// Check whether this identity holds a permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Check whether this identity holds every listed permission.
    #[must_use]
    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has_permission(p))
    }
}

/// Resolves access-token claims into identities.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    cache: Arc<IdentityCache>,
}

impl IdentityResolver {
    /// Create a resolver over a store and a shared cache.
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, cache: Arc<IdentityCache>) -> Self {
        Self { store, cache }
    }

    /// Resolve the identity behind verified access-token claims.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidToken` - the subject claim is malformed
    /// - `IdentityError::InvalidCredentials` - no such account anymore
    pub async fn resolve(&self, claims: &Claims) -> Result<Identity, IdentityError> {
        let account_id = claims.account_id().ok_or(IdentityError::InvalidToken)?;

        if let Some(identity) = self.cache.get(account_id).await {
            return Ok(identity);
        }

        let account = self
            .store
            .find_account_by_id(account_id)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let roles = self.store.roles_for_account(account_id).await?;
        let permissions: Vec<String> = self
            .store
            .permissions_for_account(account_id)
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            account_id = %account_id,
            roles = roles.len(),
            permissions = permissions.len(),
            "Resolved identity from store"
        );

        let identity = Identity {
            account,
            roles,
            permissions,
        };
        self.cache.set(account_id, identity.clone()).await;

        Ok(identity)
    }
}
