//! Domain entity models.

pub mod account;
pub mod recovery;
pub mod refresh_token;
pub mod role;

pub use account::{Account, CreateAccount};
pub use recovery::{CreateRecoveryToken, RecoveryToken, RecoveryTokenKind};
pub use refresh_token::{CreateRefreshToken, RefreshTokenRecord};
pub use role::Role;
