//! Permission-name catalog.
//!
//! Flat, namespaced permission strings. Roles own sets of these; the
//! resolver unions them per account. Kept in one place so seeds, guards
//! and tests share a single source.

/// Admin realm gate.
pub const REALM_ADMIN: &str = "realm:admin";
/// Profile realm gate.
pub const REALM_PROFILE: &str = "realm:profile";
/// Audit realm gate.
pub const REALM_AUDIT: &str = "realm:audit";

/// Read roles.
pub const ADMIN_ROLE_READ: &str = "admin:role:read";
/// Create, update and delete roles.
pub const ADMIN_ROLE_MANAGE: &str = "admin:role:manage";
/// Read the permission catalog.
pub const ADMIN_PERMISSION_READ: &str = "admin:permission:read";

/// Read any account.
pub const ADMIN_USER_READ: &str = "admin:user:read";
/// Grant and revoke roles on accounts.
pub const ADMIN_USER_ASSIGN_ROLE: &str = "admin:user:assign-role";
/// Delete accounts.
pub const ADMIN_USER_DELETE: &str = "admin:user:delete";

/// Read the audit log.
pub const AUDIT_LOG_READ: &str = "audit:log:read";

/// Read one's own profile.
pub const PROFILE_READ: &str = "profile:read";
/// Update one's own profile and password.
pub const PROFILE_UPDATE_OWN: &str = "profile:update:own";
/// Delete one's own account.
pub const PROFILE_DELETE_OWN: &str = "profile:delete:own";

/// Every permission in the catalog.
pub const ALL: &[&str] = &[
    REALM_ADMIN,
    REALM_PROFILE,
    REALM_AUDIT,
    ADMIN_ROLE_READ,
    ADMIN_ROLE_MANAGE,
    ADMIN_PERMISSION_READ,
    ADMIN_USER_READ,
    ADMIN_USER_ASSIGN_ROLE,
    ADMIN_USER_DELETE,
    AUDIT_LOG_READ,
    PROFILE_READ,
    PROFILE_UPDATE_OWN,
    PROFILE_DELETE_OWN,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn catalog_has_no_duplicates() {
        let unique: BTreeSet<_> = ALL.iter().collect();
        assert_eq!(unique.len(), ALL.len());
    }

    #[test]
    fn names_are_namespaced() {
        for name in ALL {
            assert!(name.contains(':'), "{name} is not namespaced");
        }
    }
}
