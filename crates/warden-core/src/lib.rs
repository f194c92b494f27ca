//! warden core library
//!
//! Shared types for the warden identity and session-security core.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`AccountId`, `SessionId`, `RoleId`)
//!
//! # Example
//!
//! ```
//! use warden_core::{AccountId, SessionId};
//!
//! let account_id = AccountId::new();
//! let session_id = SessionId::new();
//! assert_ne!(account_id.to_string(), session_id.to_string());
//! ```

pub mod ids;

pub use ids::{AccountId, ParseIdError, RoleId, SessionId};
