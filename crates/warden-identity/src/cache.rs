//! In-memory TTL cache for resolved identities.
//!
//! Memoizes the `{account, roles, permissions}` projection so permission
//! checks do not hit the store on every request. Entries expire on their
//! own and are evicted lazily; any mutation of an account's password, role
//! grants or verification state must invalidate that account's entry.
//!
//! The cache is safe under concurrent access but strictly process-local.
//! Other service instances each cache independently, so a permission
//! change becomes visible everywhere only after the TTL elapses on every
//! instance or each instance invalidates on its own.

use crate::resolver::Identity;
use moka::future::Cache;
use std::time::Duration;
use uuid::Uuid;
use warden_core::AccountId;

/// Maximum number of cached identities.
const MAX_CACHE_ENTRIES: u64 = 10_000;

/// Time-to-live for cache entries (seconds).
const CACHE_TTL_SECONDS: u64 = 300;

/// TTL cache of resolved identity projections, keyed by account id.
#[derive(Clone)]
pub struct IdentityCache {
    cache: Cache<Uuid, Identity>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCache {
    /// Create a cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CACHE_TTL_SECONDS))
    }

    /// Create a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Look up a fresh projection. Expired entries are treated as absent.
    pub async fn get(&self, account_id: AccountId) -> Option<Identity> {
        self.cache.get(account_id.as_uuid()).await
    }

    /// Store a projection; it stays visible for one TTL from now.
    pub async fn set(&self, account_id: AccountId, identity: Identity) {
        self.cache.insert(*account_id.as_uuid(), identity).await;
    }

    /// Drop one account's entry so the next check re-resolves from the
    /// store.
    pub async fn invalidate(&self, account_id: AccountId) {
        self.cache.invalidate(account_id.as_uuid()).await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
