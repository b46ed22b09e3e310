//! Audit log sink trait and implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AuditError;

/// Kind of audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StockDeduction,
    StockRestoration,
    BatchVoid,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StockDeduction => "stock_deduction",
            AuditAction::StockRestoration => "stock_restoration",
            AuditAction::BatchVoid => "batch_void",
        }
    }
}

/// One structured audit entry. Commits write exactly one per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: AuditAction,
    pub resource_id: String,
    pub detail: serde_json::Value,
    pub success: bool,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for audit entries.
///
/// Callers log and swallow sink errors; an audit failure never fails the
/// audited operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// In-memory audit sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to reject every entry.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuditError("audit sink unavailable".to_string()));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// Writes audit entries as structured `tracing` events on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let detail = serde_json::to_string(&entry.detail)
            .map_err(|e| AuditError(format!("unserializable detail: {e}")))?;

        tracing::info!(
            target: "audit",
            actor = %entry.actor,
            action = entry.action.as_str(),
            resource_id = %entry.resource_id,
            success = entry.success,
            error = entry.error_message.as_deref().unwrap_or(""),
            %detail,
            "audit entry"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AuditEntry {
        AuditEntry {
            actor: "packer-1".to_string(),
            action: AuditAction::StockDeduction,
            resource_id: "batch".to_string(),
            detail: serde_json::json!({ "changes": [] }),
            success: true,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_sink_records() {
        let sink = InMemoryAuditSink::new();
        sink.record(entry()).await.unwrap();
        assert_eq!(sink.entry_count().await, 1);
        assert_eq!(sink.entries().await[0].actor, "packer-1");
    }

    #[tokio::test]
    async fn test_in_memory_sink_failure() {
        let sink = InMemoryAuditSink::new();
        sink.set_fail(true);
        assert!(sink.record(entry()).await.is_err());
        assert_eq!(sink.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_entries() {
        assert!(TracingAuditSink.record(entry()).await.is_ok());
    }
}
