//! Role entity model.
//!
//! Roles own flat, namespaced permission names (for example
//! `admin:role:manage`). Grants are a plain many-to-many between accounts
//! and roles; the resolved permission set for an account is the
//! de-duplicated union across all its roles.

use sqlx::FromRow;
use warden_core::RoleId;

/// Role granted to accounts by name when registering.
pub const DEFAULT_ROLE: &str = "user";

/// A named role.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    /// Unique identifier for the role.
    pub id: uuid::Uuid,

    /// Role name (unique, e.g. "user", "admin").
    pub name: String,
}

impl Role {
    /// Get the role id as a typed `RoleId`.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        RoleId::from_uuid(self.id)
    }
}
