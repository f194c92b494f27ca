//! Persistence collaborators for the warden identity core.
//!
//! The orchestration layer never talks to a database directly; it goes
//! through the capability traits defined here:
//!
//! - [`IdentityStore`] - durable storage for accounts, refresh-token
//!   records, recovery tokens and the role/permission graph, including the
//!   atomic composite operations the security flows depend on
//! - [`AuditSink`] - fire-and-forget recording of security-relevant events
//!
//! Two backends ship with the crate: [`postgres::PgIdentityStore`] (sqlx,
//! the production backend) and [`memory::MemoryIdentityStore`] (a
//! single-process backend used by the test suites and useful for
//! embedding).

pub mod audit;
pub mod error;
pub mod memory;
pub mod models;
pub mod page;
pub mod postgres;
pub mod store;

pub use audit::{AuditEntry, AuditSink, MemoryAuditSink, PgAuditSink};
pub use error::StoreError;
pub use memory::MemoryIdentityStore;
pub use models::{
    Account, CreateAccount, CreateRecoveryToken, CreateRefreshToken, RecoveryToken,
    RecoveryTokenKind, RefreshTokenRecord, Role,
};
pub use page::{Page, PageArgs};
pub use postgres::PgIdentityStore;
pub use store::IdentityStore;
