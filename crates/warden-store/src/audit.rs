//! Audit sink collaborator.
//!
//! Every security-relevant state transition is reported here. The sink is
//! fire-and-forget: callers log failures and move on, an audit outage
//! never fails the operation that triggered it.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Mutex;
use warden_core::AccountId;

/// A recorded audit event.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Event name, e.g. `login.locked` or `password.reset`.
    pub action: String,
    /// Who acted. None for system-triggered events.
    pub actor_id: Option<uuid::Uuid>,
    /// What the action targeted.
    pub target_id: Option<uuid::Uuid>,
    /// Kind of the target, e.g. `account`.
    pub target_type: String,
    /// Free-form event context.
    pub metadata: Option<serde_json::Value>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Sink for security-relevant events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event.
    async fn log(
        &self,
        action: &str,
        actor_id: Option<AccountId>,
        target_id: Option<AccountId>,
        target_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), StoreError>;
}

/// Audit sink writing to a Postgres `audit_log` table.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    /// Create a sink over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log(
        &self,
        action: &str,
        actor_id: Option<AccountId>,
        target_id: Option<AccountId>,
        target_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO audit_log (id, action, actor_id, target_id, target_type, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(action)
        .bind(actor_id.map(|id| *id.as_uuid()))
        .bind(target_id.map(|id| *id.as_uuid()))
        .bind(target_type)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Audit sink collecting events in memory, for tests and embedding.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Recorded action names, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log(
        &self,
        action: &str,
        actor_id: Option<AccountId>,
        target_id: Option<AccountId>,
        target_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        self.entries.lock().unwrap().push(AuditEntry {
            action: action.to_string(),
            actor_id: actor_id.map(|id| *id.as_uuid()),
            target_id: target_id.map(|id| *id.as_uuid()),
            target_type: target_type.to_string(),
            metadata,
            created_at: Utc::now(),
        });
        Ok(())
    }
}
